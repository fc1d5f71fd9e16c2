use crate::utils::error::{LocalDbError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

pub const DEFAULT_PORT_RANGE: Range<u16> = 8100..8500;

/// Resource type marking DynamoDB tables in a CloudFormation template.
pub const TABLE_RESOURCE_TYPE: &str = "AWS::DynamoDB::Table";

/// A row as written by the resource layer: attribute name to JSON value.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Table name to the rows to load into that table.
pub type FixtureData = BTreeMap<String, Vec<Item>>;

pub fn fixture_data_from_json(content: &str) -> Result<FixtureData> {
    Ok(serde_json::from_str(content)?)
}

/// Candidate TCP ports, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRange {
    Span(Range<u16>),
    Ports(Vec<u16>),
}

impl PortRange {
    pub fn iter(&self) -> Box<dyn Iterator<Item = u16> + '_> {
        match self {
            PortRange::Span(range) => Box::new(range.clone()),
            PortRange::Ports(ports) => Box::new(ports.iter().copied()),
        }
    }
}

impl Default for PortRange {
    fn default() -> Self {
        PortRange::Span(DEFAULT_PORT_RANGE)
    }
}

impl From<Range<u16>> for PortRange {
    fn from(range: Range<u16>) -> Self {
        PortRange::Span(range)
    }
}

impl From<Vec<u16>> for PortRange {
    fn from(ports: Vec<u16>) -> Self {
        PortRange::Ports(ports)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRange::Span(range) => write!(f, "{}..{}", range.start, range.end),
            PortRange::Ports(ports) => write!(f, "{:?}", ports),
        }
    }
}

/// Parses `8100..8500` (end exclusive) or a comma separated list `8100,8200`.
impl FromStr for PortRange {
    type Err = LocalDbError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| LocalDbError::InvalidConfigValueError {
            field: "port_range".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let parse_port = |p: &str| p.trim().parse::<u16>().map_err(|_| invalid("Invalid port number"));

        if let Some((start, end)) = s.split_once("..") {
            let (start, end) = (parse_port(start)?, parse_port(end)?);
            if start >= end {
                return Err(invalid("Range start must be below range end"));
            }
            return Ok(PortRange::Span(start..end));
        }

        let ports = s
            .split(',')
            .filter(|p| !p.trim().is_empty())
            .map(parse_port)
            .collect::<Result<Vec<_>>>()?;
        if ports.is_empty() {
            return Err(invalid("No ports given"));
        }
        Ok(PortRange::Ports(ports))
    }
}

/// One `AWS::DynamoDB::Table` resource from the resolved serverless config.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub logical_id: String,
    pub properties: TableProperties,
}

impl TableDefinition {
    pub fn name(&self) -> &str {
        &self.properties.table_name
    }
}

/// The CloudFormation `Properties` block of a table. Keys that CreateTable
/// does not accept are kept in `other` and not sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableProperties {
    pub table_name: String,
    #[serde(default)]
    pub attribute_definitions: Vec<AttributeDefinition>,
    #[serde(default)]
    pub key_schema: Vec<KeySchemaElement>,
    pub billing_mode: Option<String>,
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    #[serde(default)]
    pub global_secondary_indexes: Vec<SecondaryIndex>,
    #[serde(default)]
    pub local_secondary_indexes: Vec<SecondaryIndex>,
    pub stream_specification: Option<StreamSpecification>,
    pub table_class: Option<String>,
    #[serde(rename = "SSESpecification")]
    pub sse_specification: Option<SseSpecification>,
    pub deletion_protection_enabled: Option<bool>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl TableProperties {
    /// Keys with no CreateTable counterpart, such as
    /// `TimeToLiveSpecification`.
    pub fn unsent_keys(&self) -> Vec<&str> {
        self.other.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    #[serde(deserialize_with = "capacity_units")]
    pub read_capacity_units: i64,
    #[serde(deserialize_with = "capacity_units")]
    pub write_capacity_units: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecondaryIndex {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub projection: Projection,
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    pub projection_type: Option<String>,
    #[serde(default)]
    pub non_key_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamSpecification {
    pub stream_view_type: Option<String>,
}

/// CloudFormation spelling: `SSEEnabled`, `SSEType`, `KMSMasterKeyId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseSpecification {
    #[serde(rename = "SSEEnabled")]
    pub sse_enabled: Option<bool>,
    #[serde(rename = "SSEType")]
    pub sse_type: Option<String>,
    #[serde(rename = "KMSMasterKeyId")]
    pub kms_master_key_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

// Resolved configs carry capacity units as either numbers or strings.
fn capacity_units<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Units {
        Number(i64),
        Text(String),
    }

    match Units::deserialize(deserializer)? {
        Units::Number(n) => Ok(n),
        Units::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
