use crate::adapters::attribute::{from_attribute_map, to_attribute_map};
use crate::domain::model::{self, Item, TableProperties};
use crate::domain::ports::{ResourceHandle, TableClient};
use crate::utils::error::{LocalDbError, Result};
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ProvisionedThroughput, PutRequest,
    ScalarAttributeType, SseSpecification, SseType, StreamSpecification, StreamViewType, TableClass,
    Tag, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use std::time::Duration;

/// Registry name of the DynamoDB service.
pub const SERVICE_NAME: &str = "dynamodb";

/// DynamoDB Local accepts any region and credentials, but the SDK needs some
/// to sign requests.
const LOCAL_REGION: &str = "us-east-1";

/// BatchWriteItem accepts at most 25 requests.
const BATCH_SIZE: usize = 25;
const MAX_UNPROCESSED_ATTEMPTS: u32 = 8;
const UNPROCESSED_BACKOFF: Duration = Duration::from_millis(50);

fn local_credentials() -> Credentials {
    Credentials::new("local", "local", None, None, "run-dynamodb-local")
}

/// Shared config suitable for talking to DynamoDB Local.
pub async fn local_sdk_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(LOCAL_REGION))
        .credentials_provider(local_credentials())
        .load()
        .await
}

/// A DynamoDB client that remembers the endpoint it was built for.
#[derive(Debug, Clone)]
pub struct DynamoDbClient {
    inner: Client,
    endpoint_url: Option<String>,
}

impl DynamoDbClient {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            inner: Client::new(sdk_config),
            endpoint_url: sdk_config.endpoint_url().map(str::to_string),
        }
    }

    /// Builds a client for `endpoint_url`, filling in a region and static
    /// credentials when `sdk_config` has none.
    pub fn with_endpoint(sdk_config: &SdkConfig, endpoint_url: &str) -> Self {
        let mut builder =
            aws_sdk_dynamodb::config::Builder::from(sdk_config).endpoint_url(endpoint_url);
        if sdk_config.region().is_none() {
            builder = builder.region(Region::new(LOCAL_REGION));
        }
        if sdk_config.credentials_provider().is_none() {
            builder = builder.credentials_provider(local_credentials());
        }

        Self {
            inner: Client::from_conf(builder.build()),
            endpoint_url: Some(endpoint_url.to_string()),
        }
    }

}

#[async_trait::async_trait]
impl TableClient for DynamoDbClient {
    fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    async fn list_table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut start_table: Option<String> = None;

        loop {
            let output = self
                .inner
                .list_tables()
                .set_exclusive_start_table_name(start_table.take())
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;

            names.extend(output.table_names().iter().cloned());
            match output.last_evaluated_table_name() {
                Some(last) => start_table = Some(last.to_string()),
                None => break,
            }
        }

        Ok(names)
    }

    async fn delete_table(&self, table_name: &str) -> Result<()> {
        self.inner
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        Ok(())
    }

    async fn create_table(&self, properties: &TableProperties) -> Result<()> {
        let unsent = properties.unsent_keys();
        if !unsent.is_empty() {
            tracing::warn!(
                "CreateTable for {} ignores {:?}",
                properties.table_name,
                unsent
            );
        }

        let attribute_definitions = properties
            .attribute_definitions
            .iter()
            .map(|a| {
                AttributeDefinition::builder()
                    .attribute_name(&a.attribute_name)
                    .attribute_type(ScalarAttributeType::from(a.attribute_type.as_str()))
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let global_indexes = properties
            .global_secondary_indexes
            .iter()
            .map(|index| {
                GlobalSecondaryIndex::builder()
                    .index_name(&index.index_name)
                    .set_key_schema(Some(key_schema(&index.key_schema)?))
                    .projection(projection(&index.projection))
                    .set_provisioned_throughput(
                        index.provisioned_throughput.as_ref().map(throughput).transpose()?,
                    )
                    .build()
                    .map_err(LocalDbError::from)
            })
            .collect::<Result<Vec<_>>>()?;

        let local_indexes = properties
            .local_secondary_indexes
            .iter()
            .map(|index| {
                LocalSecondaryIndex::builder()
                    .index_name(&index.index_name)
                    .set_key_schema(Some(key_schema(&index.key_schema)?))
                    .projection(projection(&index.projection))
                    .build()
                    .map_err(LocalDbError::from)
            })
            .collect::<Result<Vec<_>>>()?;

        let stream = properties
            .stream_specification
            .as_ref()
            .map(|spec| {
                StreamSpecification::builder()
                    .stream_enabled(true)
                    .set_stream_view_type(spec.stream_view_type.as_deref().map(StreamViewType::from))
                    .build()
            })
            .transpose()?;

        let sse = properties.sse_specification.as_ref().map(|spec| {
            SseSpecification::builder()
                .set_enabled(spec.sse_enabled)
                .set_sse_type(spec.sse_type.as_deref().map(SseType::from))
                .set_kms_master_key_id(spec.kms_master_key_id.clone())
                .build()
        });

        let tags = properties
            .tags
            .iter()
            .map(|t| Tag::builder().key(&t.key).value(&t.value).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.inner
            .create_table()
            .table_name(&properties.table_name)
            .set_attribute_definitions(non_empty(attribute_definitions))
            .set_key_schema(Some(key_schema(&properties.key_schema)?))
            .set_billing_mode(properties.billing_mode.as_deref().map(BillingMode::from))
            .set_provisioned_throughput(
                properties.provisioned_throughput.as_ref().map(throughput).transpose()?,
            )
            .set_global_secondary_indexes(non_empty(global_indexes))
            .set_local_secondary_indexes(non_empty(local_indexes))
            .set_stream_specification(stream)
            .set_table_class(properties.table_class.as_deref().map(TableClass::from))
            .set_sse_specification(sse)
            .set_deletion_protection_enabled(properties.deletion_protection_enabled)
            .set_tags(non_empty(tags))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        Ok(())
    }
}

fn key_schema(elements: &[model::KeySchemaElement]) -> Result<Vec<KeySchemaElement>> {
    elements
        .iter()
        .map(|k| {
            KeySchemaElement::builder()
                .attribute_name(&k.attribute_name)
                .key_type(KeyType::from(k.key_type.as_str()))
                .build()
                .map_err(LocalDbError::from)
        })
        .collect()
}

fn projection(p: &model::Projection) -> Projection {
    Projection::builder()
        .set_projection_type(p.projection_type.as_deref().map(ProjectionType::from))
        .set_non_key_attributes(non_empty(p.non_key_attributes.clone()))
        .build()
}

fn throughput(t: &model::ProvisionedThroughput) -> Result<ProvisionedThroughput> {
    Ok(ProvisionedThroughput::builder()
        .read_capacity_units(t.read_capacity_units)
        .write_capacity_units(t.write_capacity_units)
        .build()?)
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Resource-style access: tables addressed by name, items as JSON maps.
#[derive(Debug, Clone)]
pub struct DynamoDbResource {
    client: DynamoDbClient,
}

impl DynamoDbResource {
    pub fn new(client: DynamoDbClient) -> Self {
        Self { client }
    }

    pub fn table(&self, name: &str) -> Table {
        Table {
            client: self.client.inner.clone(),
            name: name.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ResourceHandle for DynamoDbResource {
    type Client = DynamoDbClient;

    fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    async fn write_items(&self, table_name: &str, items: &[Item]) -> Result<()> {
        let mut batch = self.table(table_name).batch_writer();
        for item in items {
            tracing::debug!("Adding item to table {}: {:?}", table_name, item);
            batch.put_item(item).await?;
        }
        batch.close().await
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    client: Client,
    name: String,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_writer(&self) -> BatchWriter {
        BatchWriter {
            client: self.client.clone(),
            table_name: self.name.clone(),
            pending: Vec::new(),
        }
    }

    pub async fn put_item(&self, item: &Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.name)
            .set_item(Some(to_attribute_map(item)))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        Ok(())
    }

    pub async fn get_item(&self, key: &Item) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.name)
            .set_key(Some(to_attribute_map(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        Ok(output.item().map(from_attribute_map))
    }

    /// Reads every item in the table.
    pub async fn scan(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.name)
                .consistent_read(true)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;

            items.extend(output.items().iter().map(from_attribute_map));
            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Buffers puts and sends them in BatchWriteItem calls of up to 25 items.
/// Call [`BatchWriter::close`] to send what is left; dropping the writer
/// discards unsent items.
#[derive(Debug)]
pub struct BatchWriter {
    client: Client,
    table_name: String,
    pending: Vec<WriteRequest>,
}

impl BatchWriter {
    pub async fn put_item(&mut self, item: &Item) -> Result<()> {
        let put = PutRequest::builder()
            .set_item(Some(to_attribute_map(item)))
            .build()?;
        self.pending.push(WriteRequest::builder().put_request(put).build());

        if self.pending.len() >= BATCH_SIZE {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        while !self.pending.is_empty() {
            let take = self.pending.len().min(BATCH_SIZE);
            let batch: Vec<WriteRequest> = self.pending.drain(..take).collect();
            self.send_batch(batch).await?;
        }
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.flush().await
    }

    async fn send_batch(&self, mut batch: Vec<WriteRequest>) -> Result<()> {
        let mut attempts = 0;

        loop {
            let output = self
                .client
                .batch_write_item()
                .request_items(&self.table_name, batch)
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;

            let unprocessed = output
                .unprocessed_items()
                .and_then(|items| items.get(&self.table_name))
                .cloned()
                .unwrap_or_default();
            if unprocessed.is_empty() {
                return Ok(());
            }

            attempts += 1;
            if attempts >= MAX_UNPROCESSED_ATTEMPTS {
                return Err(LocalDbError::UnprocessedItems {
                    table: self.table_name.clone(),
                    count: unprocessed.len(),
                });
            }

            tracing::debug!(
                "Resubmitting {} unprocessed items for {}",
                unprocessed.len(),
                self.table_name
            );
            tokio::time::sleep(UNPROCESSED_BACKOFF * attempts).await;
            batch = unprocessed;
        }
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(
                "Batch writer for {} dropped with {} unsent items",
                self.table_name,
                self.pending.len()
            );
        }
    }
}
