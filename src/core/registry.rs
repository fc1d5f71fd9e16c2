use crate::utils::error::{LocalDbError, Result};
use aws_config::SdkConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Builds a handle from the caller's construction arguments.
pub type Handler<T> = Arc<dyn Fn(&SdkConfig) -> Result<T> + Send + Sync>;

/// Client and resource factories for one service.
pub struct Handlers<C, R> {
    pub clients: Handler<C>,
    pub resources: Handler<R>,
}

impl<C, R> Handlers<C, R> {
    pub fn new<FC, FR>(clients: FC, resources: FR) -> Self
    where
        FC: Fn(&SdkConfig) -> Result<C> + Send + Sync + 'static,
        FR: Fn(&SdkConfig) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            clients: Arc::new(clients),
            resources: Arc::new(resources),
        }
    }
}

impl<C, R> Clone for Handlers<C, R> {
    fn clone(&self) -> Self {
        Self {
            clients: Arc::clone(&self.clients),
            resources: Arc::clone(&self.resources),
        }
    }
}

struct Registration<C, R> {
    id: u64,
    service: String,
    handlers: Handlers<C, R>,
}

/// Process-wide switchboard for client construction.
///
/// Code that needs a client asks the registry instead of building one. While
/// patching is engaged, a service with registered handlers gets its handles
/// from those; everything else goes to the real handlers. Create one at the
/// composition root and share it as `Arc<HandlerRegistry<_, _>>`.
pub struct HandlerRegistry<C, R> {
    engaged: AtomicBool,
    next_id: AtomicU64,
    registrations: Mutex<Vec<Registration<C, R>>>,
    real: Handlers<C, R>,
}

impl<C, R> HandlerRegistry<C, R> {
    pub fn new(real: Handlers<C, R>) -> Self {
        Self {
            engaged: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            registrations: Mutex::new(Vec::new()),
            real,
        }
    }

    pub fn engage_patching(&self) {
        self.engaged.store(true, Ordering::SeqCst);
    }

    pub fn disengage_patching(&self) {
        self.engaged.store(false, Ordering::SeqCst);
    }

    pub fn patching_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// Redirects `service` to `handlers` until the returned guard is dropped.
    /// Only one registration per service may be active.
    pub fn enter_handlers(
        self: &Arc<Self>,
        service: &str,
        handlers: Handlers<C, R>,
    ) -> Result<HandlerGuard<C, R>> {
        if !self.patching_engaged() {
            return Err(LocalDbError::PatchingNotEngaged);
        }

        let mut registrations = self.lock();
        if registrations.iter().any(|r| r.service == service) {
            return Err(LocalDbError::HandlersAlreadyRegistered {
                service: service.to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        registrations.push(Registration {
            id,
            service: service.to_string(),
            handlers,
        });
        tracing::debug!("Registered handlers for {} (registration {})", service, id);

        Ok(HandlerGuard {
            registry: Arc::clone(self),
            id,
            service: service.to_string(),
        })
    }

    pub fn is_registered(&self, service: &str) -> bool {
        self.lock().iter().any(|r| r.service == service)
    }

    pub fn registration_count(&self) -> usize {
        self.lock().len()
    }

    pub fn client(&self, service: &str, config: &SdkConfig) -> Result<C> {
        let handlers = self.handlers_for(service);
        (handlers.clients)(config)
    }

    pub fn resource(&self, service: &str, config: &SdkConfig) -> Result<R> {
        let handlers = self.handlers_for(service);
        (handlers.resources)(config)
    }

    // Cloned out so handlers run without the lock held.
    fn handlers_for(&self, service: &str) -> Handlers<C, R> {
        if self.patching_engaged() {
            if let Some(registration) = self.lock().iter().rev().find(|r| r.service == service) {
                return registration.handlers.clone();
            }
        }
        self.real.clone()
    }

    fn release(&self, id: u64, service: &str) {
        let mut registrations = self.lock();
        match registrations.iter().position(|r| r.id == id) {
            Some(index) => {
                if index + 1 != registrations.len() {
                    tracing::warn!("Handlers for {} released out of order", service);
                }
                registrations.remove(index);
                tracing::debug!("Released handlers for {} (registration {})", service, id);
            }
            None => tracing::warn!("Handlers for {} were already released", service),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration<C, R>>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps a registration alive; dropping it restores the previous handlers.
pub struct HandlerGuard<C, R> {
    registry: Arc<HandlerRegistry<C, R>>,
    id: u64,
    service: String,
}

impl<C, R> HandlerGuard<C, R> {
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl<C, R> Drop for HandlerGuard<C, R> {
    fn drop(&mut self) {
        self.registry.release(self.id, &self.service);
    }
}
