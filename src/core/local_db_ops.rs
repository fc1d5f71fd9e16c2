use crate::core::table_builder::{LocalTableBuilder, ServerlessCli};
use crate::domain::model::FixtureData;
use crate::domain::ports::ResourceHandle;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

/// Per-test table resets against a DynamoDB Local.
pub struct LocalDbOps {
    serverless_config: PathBuf,
    cli: ServerlessCli,
    table_builder: OnceCell<LocalTableBuilder>,
}

impl LocalDbOps {
    /// The serverless config is not read until the first table reset.
    pub fn new(serverless_config: impl Into<PathBuf>) -> Self {
        Self {
            serverless_config: serverless_config.into(),
            cli: ServerlessCli::default(),
            table_builder: OnceCell::new(),
        }
    }

    pub fn with_cli(mut self, cli: ServerlessCli) -> Self {
        self.cli = cli;
        self
    }

    pub fn from_builder(table_builder: LocalTableBuilder) -> Self {
        Self {
            serverless_config: table_builder.serverless_config_path().to_path_buf(),
            cli: ServerlessCli::default(),
            table_builder: OnceCell::from(table_builder),
        }
    }

    pub fn serverless_config(&self) -> &Path {
        &self.serverless_config
    }

    pub async fn table_builder(&self) -> Result<&LocalTableBuilder> {
        self.table_builder
            .get_or_try_init(|| LocalTableBuilder::with_cli(&self.serverless_config, &self.cli))
            .await
    }

    /// Recreates the configured tables and fills them with `fixture_data`.
    ///
    /// Fixture keys are table names; their rows are written with the
    /// resource's batch writer, attribute types inferred from the JSON values.
    pub async fn fresh_test_tables<R: ResourceHandle>(
        &self,
        resource: &R,
        fixture_data: Option<&FixtureData>,
    ) -> Result<()> {
        self.table_builder()
            .await?
            .recreate_through(resource.client())
            .await?;

        tracing::info!(
            "{} tables to populate",
            fixture_data.map(|f| f.len()).unwrap_or(0)
        );
        if let Some(fixtures) = fixture_data {
            for (table_name, items) in fixtures {
                resource.write_items(table_name, items).await?;
            }
        }

        Ok(())
    }
}
