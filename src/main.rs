use clap::Parser;
use run_dynamodb_local::utils::{logger, validation::Validate};
use run_dynamodb_local::{
    local_sdk_config, CliConfig, DynamoDbClient, DynamoDbLocal, DynamoDbResource, LocalDbError,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const READY_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = cli.to_local_db_config()?;
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let Some(dynamodb_local_path) = config.dynamodb_local_path() else {
        let e = LocalDbError::NoServiceConfigured;
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    };

    let interrupt = CancellationToken::new();
    let options = config.service_options()?.with_interrupt(interrupt.clone());
    let mut service = DynamoDbLocal::start(&dynamodb_local_path, &options).await?;
    let endpoint_url = service.endpoint_url();

    let provisioned = async {
        service.wait_until_ready(READY_TIMEOUT).await?;

        if let Some(ops) = config.local_db_ops() {
            let sdk_config = local_sdk_config().await;
            let resource =
                DynamoDbResource::new(DynamoDbClient::with_endpoint(&sdk_config, &endpoint_url));
            let fixtures = config.load_fixture_data().await?;
            ops.fresh_test_tables(&resource, fixtures.as_ref()).await?;
            tracing::info!("✅ Tables from {} created", ops.serverless_config().display());
        }
        Ok::<(), LocalDbError>(())
    }
    .await;

    if let Err(e) = provisioned {
        tracing::error!("❌ Provisioning failed: {}", e);
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        service.shutdown().await?;
        return Err(e.into());
    }

    println!("DynamoDBLocal listening on {} (Ctrl-C to stop)", endpoint_url);
    tokio::signal::ctrl_c().await?;

    // A second Ctrl-C stops waiting for a graceful exit.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let status = service.shutdown().await?;
    tracing::info!("DynamoDBLocal stopped ({})", status);
    Ok(())
}
