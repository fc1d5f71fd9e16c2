#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_dynamodb::types::error::{ResourceInUseException, ResourceNotFoundException};
use run_dynamodb_local::domain::model::{Item, TableProperties};
use run_dynamodb_local::domain::ports::{ResourceHandle, TableClient};
use run_dynamodb_local::{LocalDbError, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const LOCAL_ENDPOINT: &str = "http://localhost:8100";

/// `serverless print --format=json` output with two tables and a queue.
pub fn resolved_config() -> Value {
    json!({
        "service": "shop",
        "provider": {"name": "aws", "runtime": "python3.12"},
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
                        "AttributeDefinitions": [
                            {"AttributeName": "customerId", "AttributeType": "S"},
                            {"AttributeName": "orderId", "AttributeType": "S"}
                        ],
                        "KeySchema": [
                            {"AttributeName": "customerId", "KeyType": "HASH"},
                            {"AttributeName": "orderId", "KeyType": "RANGE"}
                        ],
                        "ProvisionedThroughput": {
                            "ReadCapacityUnits": "5",
                            "WriteCapacityUnits": 5
                        }
                    }
                }
            }
        }
    })
}

pub fn item(value: Value) -> Item {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// Port that nothing listens on right now.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Writes an executable shell script to `dir/name`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A DynamoDB Local directory whose "java" appends its arguments to
/// `launches.log` and then runs `body`, with options pointing at it.
#[cfg(unix)]
pub fn fake_install(body: &str) -> (tempfile::TempDir, run_dynamodb_local::ServiceOptions) {
    let dir = tempfile::TempDir::new().unwrap();
    let java = write_script(
        dir.path(),
        "fake-java",
        &format!("echo \"$@\" >> launches.log\n{}", body),
    );
    let options = run_dynamodb_local::ServiceOptions::default()
        .with_port_range(vec![free_port()])
        .with_java_program(java);
    (dir, options)
}

/// Lines in the fake install's `launches.log`.
pub fn launches(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("launches.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct FakeTable {
    key: Vec<String>,
    items: Vec<Item>,
}

/// In-memory stand-in for a DynamoDB client and resource. Records every
/// table-level call in order.
#[derive(Debug)]
pub struct FakeDynamoDb {
    endpoint_url: Option<String>,
    tables: Mutex<BTreeMap<String, FakeTable>>,
    calls: Mutex<Vec<String>>,
    fail_create: Option<String>,
}

impl FakeDynamoDb {
    pub fn new(endpoint_url: Option<&str>) -> Self {
        Self {
            endpoint_url: endpoint_url.map(str::to_string),
            tables: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_create: None,
        }
    }

    pub fn local() -> Self {
        Self::new(Some(LOCAL_ENDPOINT))
    }

    pub fn failing_create_of(mut self, table_name: &str) -> Self {
        self.fail_create = Some(table_name.to_string());
        self
    }

    /// Adds a table outside of the recorded calls.
    pub fn with_table(self, table_name: &str, key: &[&str], items: Vec<Item>) -> Self {
        self.tables.lock().unwrap().insert(
            table_name.to_string(),
            FakeTable {
                key: key.iter().map(|k| k.to_string()).collect(),
                items,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.lock().unwrap().keys().cloned().collect()
    }

    pub fn items(&self, table_name: &str) -> Vec<Item> {
        self.tables
            .lock()
            .unwrap()
            .get(table_name)
            .map(|t| t.items.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn not_found(table_name: &str) -> LocalDbError {
    aws_sdk_dynamodb::Error::ResourceNotFoundException(
        ResourceNotFoundException::builder()
            .message(format!("Cannot do operations on a non-existent table: {}", table_name))
            .build(),
    )
    .into()
}

#[async_trait]
impl TableClient for FakeDynamoDb {
    fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    async fn list_table_names(&self) -> Result<Vec<String>> {
        self.record("list".to_string());
        Ok(self.table_names())
    }

    async fn delete_table(&self, table_name: &str) -> Result<()> {
        self.record(format!("delete:{}", table_name));
        match self.tables.lock().unwrap().remove(table_name) {
            Some(_) => Ok(()),
            None => Err(not_found(table_name)),
        }
    }

    async fn create_table(&self, properties: &TableProperties) -> Result<()> {
        self.record(format!("create:{}", properties.table_name));
        if self.fail_create.as_deref() == Some(properties.table_name.as_str()) {
            return Err(LocalDbError::ToolFailed {
                program: "fake".to_string(),
                code: None,
                stderr: "create refused".to_string(),
            });
        }

        let mut tables = self.tables.lock().unwrap();
        if tables.contains_key(&properties.table_name) {
            return Err(aws_sdk_dynamodb::Error::ResourceInUseException(
                ResourceInUseException::builder()
                    .message("Cannot create preexisting table")
                    .build(),
            )
            .into());
        }
        tables.insert(
            properties.table_name.clone(),
            FakeTable {
                key: properties
                    .key_schema
                    .iter()
                    .map(|k| k.attribute_name.clone())
                    .collect(),
                items: Vec::new(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ResourceHandle for FakeDynamoDb {
    type Client = FakeDynamoDb;

    fn client(&self) -> &FakeDynamoDb {
        self
    }

    async fn write_items(&self, table_name: &str, items: &[Item]) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.get_mut(table_name).ok_or_else(|| not_found(table_name))?;

        for item in items {
            let key = table.key.clone();
            let same_key = |other: &Item| key.iter().all(|k| other.get(k) == item.get(k));
            table.items.retain(|other| !same_key(other));
            table.items.push(item.clone());
        }
        Ok(())
    }
}
