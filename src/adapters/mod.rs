// Adapters layer: the AWS SDK behind the domain ports.

pub mod attribute;
pub mod dynamodb;

pub use dynamodb::{
    local_sdk_config, BatchWriter, DynamoDbClient, DynamoDbResource, Table, SERVICE_NAME,
};
