//! Run an in-memory DynamoDB Local for tests.
//!
//! [`DynamoDbLocal`] starts the service on a free port and stops it again,
//! [`patched_into_registry`] redirects DynamoDB clients built through a
//! [`HandlerRegistry`] to it, and [`LocalDbOps`] resets the tables of a
//! serverless config (plus fixture rows) before each test.
//!
//! Requires a `java` command and an unpacked DynamoDB Local distribution.

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::LocalDbConfig;

pub use adapters::{local_sdk_config, DynamoDbClient, DynamoDbResource, SERVICE_NAME};
pub use core::local_db_ops::LocalDbOps;
pub use core::patching::{
    patched_into_registry, report_missing, with_patched_dynamodb, DynamoDbRegistry,
    MissingHandler, PatchedDynamoDb,
};
pub use core::registry::{HandlerGuard, HandlerRegistry, Handlers};
pub use core::supervisor::{find_available_port, in_subprocess, DynamoDbLocal, ServiceOptions};
pub use core::table_builder::{LocalTableBuilder, ServerlessCli};
pub use domain::model::{FixtureData, Item, PortRange, TableDefinition};
pub use utils::error::{LocalDbError, Result};
