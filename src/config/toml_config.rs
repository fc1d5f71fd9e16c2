use crate::core::local_db_ops::LocalDbOps;
use crate::core::supervisor::ServiceOptions;
use crate::core::table_builder::ServerlessCli;
use crate::domain::model::{fixture_data_from_json, FixtureData, PortRange};
use crate::utils::error::{LocalDbError, Result};
use crate::utils::validation::{
    validate_directory_contains, validate_file_extension, validate_non_empty_string,
    validate_path, validate_range, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SERVERLESS_CONFIG_EXTENSIONS: &[&str] = &["yml", "yaml", "json", "js", "ts"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalDbConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    pub provisioning: Option<ProvisioningConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the unpacked DynamoDBLocal distribution.
    pub path: Option<String>,
    pub java_program: Option<String>,
    /// `8100..8500` or `8100,8200`.
    pub port_range: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub serverless_config: String,
    pub serverless_program: Option<String>,
    /// JSON file mapping table names to rows.
    pub fixtures: Option<String>,
}

impl LocalDbConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LocalDbError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LocalDbError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Reads `DYNAMODB_LOCAL_PATH`, `DYNAMODB_LOCAL_PORT_RANGE`, `JAVA_PROGRAM`,
    /// `SERVERLESS_CONFIG`, `SERVERLESS_PROGRAM` and `DYNAMODB_FIXTURES`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            service: ServiceConfig {
                path: var("DYNAMODB_LOCAL_PATH"),
                java_program: var("JAVA_PROGRAM"),
                port_range: var("DYNAMODB_LOCAL_PORT_RANGE"),
            },
            provisioning: var("SERVERLESS_CONFIG").map(|serverless_config| ProvisioningConfig {
                serverless_config,
                serverless_program: var("SERVERLESS_PROGRAM"),
                fixtures: var("DYNAMODB_FIXTURES"),
            }),
        }
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| LocalDbError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// The DynamoDBLocal directory, or `None` when not configured (including
    /// an unresolved `${VAR}`).
    pub fn dynamodb_local_path(&self) -> Option<PathBuf> {
        match self.service.path.as_deref() {
            Some(path) if path.contains("${") => {
                tracing::error!("DynamoDBLocal path {} references an unset variable", path);
                None
            }
            Some(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
            _ => None,
        }
    }

    pub fn service_options(&self) -> Result<ServiceOptions> {
        let mut options = ServiceOptions::default();
        if let Some(port_range) = &self.service.port_range {
            options.port_range = port_range.parse::<PortRange>()?;
        }
        if let Some(java_program) = &self.service.java_program {
            options.java_program = PathBuf::from(java_program);
        }
        Ok(options)
    }

    pub fn serverless_cli(&self) -> ServerlessCli {
        self.provisioning
            .as_ref()
            .and_then(|p| p.serverless_program.as_deref())
            .map(ServerlessCli::new)
            .unwrap_or_default()
    }

    /// Table operations for the configured serverless config, if any.
    pub fn local_db_ops(&self) -> Option<LocalDbOps> {
        self.provisioning.as_ref().map(|p| {
            LocalDbOps::new(PathBuf::from(&p.serverless_config)).with_cli(self.serverless_cli())
        })
    }

    pub async fn load_fixture_data(&self) -> Result<Option<FixtureData>> {
        let Some(path) = self.provisioning.as_ref().and_then(|p| p.fixtures.as_ref()) else {
            return Ok(None);
        };
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Some(fixture_data_from_json(&content)?))
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(path) = self.dynamodb_local_path() {
            validate_path("service.path", &path.to_string_lossy())?;
            validate_directory_contains(
                "service.path",
                &path,
                &["DynamoDBLocal.jar", "DynamoDBLocal_lib"],
            )?;
        }

        if let Some(java_program) = &self.service.java_program {
            validate_non_empty_string("service.java_program", java_program)?;
        }

        if let PortRange::Span(range) = self.service_options()?.port_range {
            validate_range("service.port_range", range.start, 1, u16::MAX)?;
        }

        if let Some(provisioning) = &self.provisioning {
            validate_path("provisioning.serverless_config", &provisioning.serverless_config)?;
            validate_file_extension(
                "provisioning.serverless_config",
                Path::new(&provisioning.serverless_config),
                SERVERLESS_CONFIG_EXTENSIONS,
            )?;
            if let Some(fixtures) = &provisioning.fixtures {
                validate_file_extension("provisioning.fixtures", Path::new(fixtures), &["json"])?;
            }
        }

        Ok(())
    }
}

impl Validate for LocalDbConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
