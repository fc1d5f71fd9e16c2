pub mod toml_config;

pub use toml_config::{LocalDbConfig, ProvisioningConfig, ServiceConfig};

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "run-dynamodb-local")]
#[command(about = "Run an in-memory DynamoDBLocal and provision tables into it")]
pub struct CliConfig {
    #[arg(long, help = "TOML config file; command line values take precedence")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "DYNAMODB_LOCAL_PATH", help = "Unpacked DynamoDBLocal directory")]
    pub dynamodb_local_path: Option<String>,

    #[arg(long, help = "Ports to try, e.g. 8100..8500 or 8100,8200")]
    pub port_range: Option<String>,

    #[arg(long, env = "JAVA_PROGRAM")]
    pub java_program: Option<String>,

    #[arg(long, help = "Serverless config whose tables are created")]
    pub serverless_config: Option<String>,

    #[arg(long, default_value = "serverless")]
    pub serverless_program: String,

    #[arg(long, help = "JSON file of table name to rows", requires = "serverless_config")]
    pub fixtures: Option<String>,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads `--config` (if any) and overlays the command line values.
    pub fn to_local_db_config(&self) -> Result<LocalDbConfig> {
        let mut config = match &self.config {
            Some(path) => LocalDbConfig::from_file(path)?,
            None => LocalDbConfig::default(),
        };

        if let Some(path) = &self.dynamodb_local_path {
            config.service.path = Some(path.clone());
        }
        if let Some(port_range) = &self.port_range {
            config.service.port_range = Some(port_range.clone());
        }
        if let Some(java_program) = &self.java_program {
            config.service.java_program = Some(java_program.clone());
        }
        if let Some(serverless_config) = &self.serverless_config {
            config.provisioning = Some(ProvisioningConfig {
                serverless_config: serverless_config.clone(),
                serverless_program: Some(self.serverless_program.clone()),
                fixtures: self.fixtures.clone(),
            });
        }

        Ok(config)
    }
}
