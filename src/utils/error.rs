use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocalDbError {
    #[error("No sockets available in {range}")]
    NoPortAvailable { range: String },

    #[error("DynamoDBLocal returned code {}", display_code(.code))]
    ServiceStartupFailed { code: Option<i32> },

    #[error("DynamoDBLocal on port {port} did not accept connections within {waited:?}")]
    ServiceNotReady {
        port: u16,
        waited: std::time::Duration,
    },

    #[error("Handler patching MUST be engaged before entering this context")]
    PatchingNotEngaged,

    #[error("No DynamoDBLocal configured (see logged errors)")]
    NoServiceConfigured,

    #[error("Refusing to modify tables through non-local endpoint: {endpoint}")]
    NotLocalEndpoint { endpoint: String },

    #[error("Handlers for service '{service}' are already registered")]
    HandlersAlreadyRegistered { service: String },

    #[error("DynamoDBLocal is not available: {reason}")]
    ServiceMissing { reason: String },

    #[error("Interrupted while waiting for DynamoDBLocal to exit")]
    Interrupted,

    #[error("'{program}' exited with code {}: {stderr}", display_code(.code))]
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unexpected serverless output: {message}")]
    InvalidServerlessOutput { message: String },

    #[error("{count} items for table '{table}' remained unprocessed")]
    UnprocessedItems { table: String, count: usize },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("DynamoDB request failed: {0}")]
    DynamoDbError(#[from] aws_sdk_dynamodb::Error),

    #[error("Invalid DynamoDB request: {0}")]
    RequestBuildError(#[from] aws_sdk_dynamodb::error::BuildError),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<terminated by signal>".to_string(),
    }
}

impl LocalDbError {
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LocalDbError::NoPortAvailable { .. } => {
                "Free a port in the range or pass a different port range"
            }
            LocalDbError::ServiceStartupFailed { .. } => {
                "Check that java is installed and the path holds DynamoDBLocal.jar and DynamoDBLocal_lib"
            }
            LocalDbError::ServiceNotReady { .. } => "Allow DynamoDBLocal more time to start",
            LocalDbError::PatchingNotEngaged => {
                "Call engage_patching() on the registry before entering the context"
            }
            LocalDbError::NoServiceConfigured => {
                "Set DYNAMODB_LOCAL_PATH or supply an on_server_missing handler"
            }
            LocalDbError::NotLocalEndpoint { .. } => {
                "Provision tables only through a client pointed at http://localhost:<port>"
            }
            LocalDbError::HandlersAlreadyRegistered { .. } => {
                "Drop the previous handler guard before registering new handlers"
            }
            LocalDbError::ServiceMissing { .. } => "Install DynamoDBLocal or skip this test",
            LocalDbError::Interrupted => "The service process was killed; rerun the tests",
            LocalDbError::ToolFailed { .. } => {
                "Check that the serverless CLI is installed and the config resolves"
            }
            LocalDbError::InvalidServerlessOutput { .. } => {
                "Make sure the serverless config declares a resources.Resources section"
            }
            LocalDbError::UnprocessedItems { .. } => "Retry loading the fixture data",
            LocalDbError::ConfigError { .. }
            | LocalDbError::ConfigValidationError { .. }
            | LocalDbError::InvalidConfigValueError { .. } => "Review the configuration values",
            LocalDbError::IoError(_) => "Check file paths and permissions",
            LocalDbError::SerializationError(_) => "Check that the JSON input is well formed",
            LocalDbError::DynamoDbError(_) => "Inspect the DynamoDB error returned by the service",
            LocalDbError::RequestBuildError(_) => {
                "Check the table properties in the serverless config"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LocalDbError>;
