use crate::domain::model::{TableDefinition, TABLE_RESOURCE_TYPE};
use crate::domain::ports::TableClient;
use crate::utils::error::{LocalDbError, Result};
use crate::utils::validation::validate_local_endpoint;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// The `serverless` command line tool.
#[derive(Debug, Clone)]
pub struct ServerlessCli {
    program: PathBuf,
}

impl Default for ServerlessCli {
    fn default() -> Self {
        Self::new("serverless")
    }
}

impl ServerlessCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `serverless print --format=json --config <file>` in the config's
    /// directory and parses what it prints.
    pub async fn print_resolved(&self, config_path: &Path) -> Result<Value> {
        let file_name = config_path
            .file_name()
            .ok_or_else(|| LocalDbError::InvalidConfigValueError {
                field: "serverless_config".to_string(),
                value: config_path.display().to_string(),
                reason: "Path does not name a file".to_string(),
            })?;
        let dir = match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        tracing::debug!(
            "Running {} print for {}",
            self.program.display(),
            config_path.display()
        );
        let output = Command::new(&self.program)
            .args(["print", "--format=json", "--config"])
            .arg(file_name)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(LocalDbError::ToolFailed {
                program: self.program.display().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Creates DynamoDB tables according to a serverless config.
///
/// The config is resolved once, when the builder is created, so the cost of
/// running the serverless tool is paid once per builder.
#[derive(Debug, Clone)]
pub struct LocalTableBuilder {
    serverless_config_path: PathBuf,
    tables: Vec<TableDefinition>,
}

impl LocalTableBuilder {
    pub async fn new(serverless_config_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_cli(serverless_config_path, &ServerlessCli::default()).await
    }

    pub async fn with_cli(serverless_config_path: impl AsRef<Path>, cli: &ServerlessCli) -> Result<Self> {
        let path = serverless_config_path.as_ref();
        let resolved = cli.print_resolved(path).await?;
        Self::from_resolved(path, &resolved)
    }

    /// Builds from output already produced by `serverless print --format=json`.
    pub fn from_resolved_config(serverless_config_path: impl AsRef<Path>, json: &str) -> Result<Self> {
        let resolved: Value = serde_json::from_str(json)?;
        Self::from_resolved(serverless_config_path.as_ref(), &resolved)
    }

    fn from_resolved(path: &Path, resolved: &Value) -> Result<Self> {
        let resources = resolved
            .get("resources")
            .and_then(|r| r.get("Resources"))
            .and_then(Value::as_object)
            .ok_or_else(|| LocalDbError::InvalidServerlessOutput {
                message: "no resources.Resources mapping".to_string(),
            })?;

        let tables = resources
            .iter()
            .filter(|(_, resource)| {
                resource.get("Type").and_then(Value::as_str) == Some(TABLE_RESOURCE_TYPE)
            })
            .map(|(logical_id, resource)| -> Result<TableDefinition> {
                let properties = resource.get("Properties").cloned().ok_or_else(|| {
                    LocalDbError::InvalidServerlessOutput {
                        message: format!("table resource {} has no Properties", logical_id),
                    }
                })?;
                Ok(TableDefinition {
                    logical_id: logical_id.clone(),
                    properties: serde_json::from_value(properties)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "{} of {} resources in {} are tables",
            tables.len(),
            resources.len(),
            path.display()
        );

        Ok(Self {
            serverless_config_path: path.to_path_buf(),
            tables,
        })
    }

    pub fn serverless_config_path(&self) -> &Path {
        &self.serverless_config_path
    }

    /// Table resources in the order the config declares them.
    pub fn tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.iter()
    }

    /// Drops and recreates every configured table through `client`.
    ///
    /// The client must point at `http://localhost`; use a supervised DynamoDB
    /// Local (see [`crate::core::patching::patched_into_registry`]). Tables not
    /// in the config are left alone.
    pub async fn recreate_through<C: TableClient>(&self, client: &C) -> Result<()> {
        validate_local_endpoint(client.endpoint_url())?;

        let existing: HashSet<String> = client.list_table_names().await?.into_iter().collect();

        for table in self.tables() {
            if existing.contains(table.name()) {
                tracing::debug!("Deleting table {}", table.name());
                client.delete_table(table.name()).await?;
            }
            tracing::debug!("Creating table {}", table.name());
            client.create_table(&table.properties).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved_config() -> String {
        json!({
            "service": "shop",
            "resources": {
                "Resources": {
                    "UsersTable": {
                        "Type": "AWS::DynamoDB::Table",
                        "Properties": {
                            "TableName": "Users",
                            "AttributeDefinitions": [{"AttributeName": "id", "AttributeType": "S"}],
                            "KeySchema": [{"AttributeName": "id", "KeyType": "HASH"}],
                            "BillingMode": "PAY_PER_REQUEST"
                        }
                    },
                    "JobQueue": {
                        "Type": "AWS::SQS::Queue",
                        "Properties": {"QueueName": "jobs"}
                    },
                    "OrdersTable": {
                        "Type": "AWS::DynamoDB::Table",
                        "Properties": {
                            "TableName": "Orders",
                            "AttributeDefinitions": [{"AttributeName": "orderId", "AttributeType": "S"}],
                            "KeySchema": [{"AttributeName": "orderId", "KeyType": "HASH"}],
                            "ProvisionedThroughput": {"ReadCapacityUnits": 1, "WriteCapacityUnits": 1}
                        }
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_tables_filters_and_keeps_order() {
        let builder =
            LocalTableBuilder::from_resolved_config("config/serverless.yml", &resolved_config())
                .unwrap();

        let names: Vec<&str> = builder.tables().map(TableDefinition::name).collect();
        assert_eq!(names, vec!["Users", "Orders"]);
        assert_eq!(builder.tables().next().unwrap().logical_id, "UsersTable");
        assert_eq!(
            builder.serverless_config_path(),
            Path::new("config/serverless.yml")
        );
    }

    #[test]
    fn test_missing_resources_section() {
        let result = LocalTableBuilder::from_resolved_config("serverless.yml", r#"{"service": "x"}"#);
        assert!(matches!(
            result,
            Err(LocalDbError::InvalidServerlessOutput { .. })
        ));
    }

    #[test]
    fn test_unparsable_output() {
        let result = LocalTableBuilder::from_resolved_config("serverless.yml", "Serverless: warning");
        assert!(matches!(result, Err(LocalDbError::SerializationError(_))));
    }

    #[test]
    fn test_table_without_properties() {
        let json = r#"{"resources": {"Resources": {"T": {"Type": "AWS::DynamoDB::Table"}}}}"#;
        let result = LocalTableBuilder::from_resolved_config("serverless.yml", json);
        assert!(matches!(
            result,
            Err(LocalDbError::InvalidServerlessOutput { .. })
        ));
    }
}
