use crate::adapters::dynamodb::{DynamoDbClient, DynamoDbResource, SERVICE_NAME};
use crate::core::registry::{HandlerGuard, HandlerRegistry, Handlers};
use crate::core::supervisor::{DynamoDbLocal, ServiceOptions};
use crate::utils::error::{LocalDbError, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type DynamoDbRegistry = HandlerRegistry<DynamoDbClient, DynamoDbResource>;

/// Called in place of building a handle when no DynamoDB Local is configured.
pub type MissingHandler = Arc<dyn Fn() -> LocalDbError + Send + Sync>;

impl HandlerRegistry<DynamoDbClient, DynamoDbResource> {
    /// A registry whose real handlers build ordinary SDK clients.
    pub fn dynamodb() -> Self {
        HandlerRegistry::new(Handlers::new(
            |config| Ok(DynamoDbClient::new(config)),
            |config| Ok(DynamoDbResource::new(DynamoDbClient::new(config))),
        ))
    }
}

/// Missing handler that fails with [`LocalDbError::ServiceMissing`].
pub fn report_missing(reason: impl Into<String>) -> MissingHandler {
    let reason = reason.into();
    Arc::new(move || LocalDbError::ServiceMissing {
        reason: reason.clone(),
    })
}

/// DynamoDB handles patched into a registry. Dropping it (or calling
/// [`PatchedDynamoDb::shutdown`]) unregisters the handlers before the service
/// stops.
pub struct PatchedDynamoDb {
    handlers: Option<HandlerGuard<DynamoDbClient, DynamoDbResource>>,
    service: Option<DynamoDbLocal>,
}

impl PatchedDynamoDb {
    /// Port of the local service; `None` when running on a missing handler.
    pub fn port(&self) -> Option<u16> {
        self.service.as_ref().map(DynamoDbLocal::port)
    }

    pub fn pid(&self) -> Option<u32> {
        self.service.as_ref().map(DynamoDbLocal::pid)
    }

    pub fn endpoint_url(&self) -> Option<String> {
        self.service.as_ref().map(DynamoDbLocal::endpoint_url)
    }

    /// See [`DynamoDbLocal::wait_until_ready`]; a no-op without a service.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        match self.service.as_mut() {
            Some(service) => service.wait_until_ready(timeout).await,
            None => Ok(()),
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        drop(self.handlers.take());
        if let Some(service) = self.service.take() {
            service.shutdown().await?;
        }
        Ok(())
    }
}

/// Patches DynamoDB into `registry`.
///
/// With `dynamodb_local_path`, a DynamoDB Local is started and every client
/// or resource built through the registry for `"dynamodb"` talks to it over
/// `http://localhost:<port>`. Without a path, those constructions call
/// `on_server_missing` and fail with its error, so tests can skip at the
/// point of use.
pub async fn patched_into_registry(
    registry: &Arc<DynamoDbRegistry>,
    dynamodb_local_path: Option<&Path>,
    options: &ServiceOptions,
    on_server_missing: Option<MissingHandler>,
) -> Result<PatchedDynamoDb> {
    if !registry.patching_engaged() {
        return Err(LocalDbError::PatchingNotEngaged);
    }

    match (dynamodb_local_path, on_server_missing) {
        (Some(path), _) => {
            if registry.is_registered(SERVICE_NAME) {
                return Err(LocalDbError::HandlersAlreadyRegistered {
                    service: SERVICE_NAME.to_string(),
                });
            }

            let service = DynamoDbLocal::start(path, options).await?;
            let endpoint = service.endpoint_url();
            let resource_endpoint = endpoint.clone();

            let handlers = Handlers::new(
                move |config| Ok(DynamoDbClient::with_endpoint(config, &endpoint)),
                move |config| {
                    Ok(DynamoDbResource::new(DynamoDbClient::with_endpoint(
                        config,
                        &resource_endpoint,
                    )))
                },
            );

            match registry.enter_handlers(SERVICE_NAME, handlers) {
                Ok(guard) => Ok(PatchedDynamoDb {
                    handlers: Some(guard),
                    service: Some(service),
                }),
                Err(e) => {
                    if let Err(shutdown_err) = service.shutdown().await {
                        tracing::warn!("Stopping DynamoDBLocal failed: {}", shutdown_err);
                    }
                    Err(e)
                }
            }
        }
        (None, Some(on_missing)) => {
            let on_missing_resource = Arc::clone(&on_missing);
            let handlers = Handlers::new(
                move |_| Err(on_missing()),
                move |_| Err(on_missing_resource()),
            );

            Ok(PatchedDynamoDb {
                handlers: Some(registry.enter_handlers(SERVICE_NAME, handlers)?),
                service: None,
            })
        }
        (None, None) => {
            tracing::error!("No DynamoDBLocal path and no on_server_missing handler given");
            Err(LocalDbError::NoServiceConfigured)
        }
    }
}

/// Scoped form of [`patched_into_registry`]: runs `body` with the service
/// port (if any) and tears the patch down afterwards.
pub async fn with_patched_dynamodb<F, Fut, T>(
    registry: &Arc<DynamoDbRegistry>,
    dynamodb_local_path: Option<&Path>,
    options: &ServiceOptions,
    on_server_missing: Option<MissingHandler>,
    body: F,
) -> Result<T>
where
    F: FnOnce(Option<u16>) -> Fut,
    Fut: Future<Output = T>,
{
    let patched =
        patched_into_registry(registry, dynamodb_local_path, options, on_server_missing).await?;
    let value = body(patched.port()).await;
    patched.shutdown().await?;
    Ok(value)
}
