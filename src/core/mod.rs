pub mod local_db_ops;
pub mod patching;
pub mod registry;
pub mod supervisor;
pub mod table_builder;

pub use crate::domain::model::{FixtureData, Item, PortRange, TableDefinition};
pub use crate::domain::ports::{ResourceHandle, TableClient};
pub use crate::utils::error::Result;
