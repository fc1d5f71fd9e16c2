use crate::domain::model::{Item, TableProperties};
use crate::utils::error::Result;
use async_trait::async_trait;

/// The client-level operations needed to reset tables.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Endpoint the client sends requests to, if one was configured.
    fn endpoint_url(&self) -> Option<&str>;

    async fn list_table_names(&self) -> Result<Vec<String>>;

    async fn delete_table(&self, table_name: &str) -> Result<()>;

    async fn create_table(&self, properties: &TableProperties) -> Result<()>;
}

/// The resource-level view: an underlying client plus batched item writes.
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    type Client: TableClient;

    fn client(&self) -> &Self::Client;

    /// Writes all `items` to `table_name` through a batch writer, flushed
    /// before returning.
    async fn write_items(&self, table_name: &str, items: &[Item]) -> Result<()>;
}
