use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use atlas_api::{ApiClient, ApiError, csrf_header};
use atlas_config::AtlasConfig;
use atlas_events::EventBus;
use atlas_modules::ModuleRegistry;
use tokio::task::JoinHandle;

use crate::reporting;

/// Configuration shared between the runtime and the module factories.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ConfigState>>,
}

#[derive(Debug, Default)]
struct ConfigState {
    config: AtlasConfig,
    csrf_token: Option<String>,
}

impl SharedConfig {
    #[must_use]
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ConfigState {
                config,
                csrf_token: None,
            })),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AtlasConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .clone()
    }

    /// Fill unset options with built-in values; options already set win.
    pub fn merge_defaults(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .merge_defaults(&AtlasConfig::defaults());
    }

    #[must_use]
    pub fn csrf_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .csrf_token
            .clone()
    }

    pub fn set_csrf_token(&self, token: impl Into<String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .csrf_token = Some(token.into());
    }

    /// Build an API client from the current settings, with the CSRF
    /// interceptor installed when a token is known.
    pub fn api_client(&self, bus: EventBus) -> Result<ApiClient, ApiError> {
        let client = ApiClient::new(self.snapshot().api_config(), bus)?;
        if let Some(interceptor) = self.csrf_token().as_deref().and_then(csrf_header) {
            client.add_request_interceptor(interceptor);
        }
        Ok(client)
    }
}

/// Context object owning the bus, the module registry and the configuration.
///
/// Clones are handles to the same runtime.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    bus: EventBus,
    modules: ModuleRegistry,
    config: SharedConfig,
}

impl Runtime {
    #[must_use]
    pub fn new(config: AtlasConfig) -> Self {
        let bus = EventBus::new();
        bus.set_debug(config.debug());
        Self {
            bus,
            modules: ModuleRegistry::new(),
            config: SharedConfig::new(config),
        }
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    #[must_use]
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Re-emit panics on this runtime's bus as `error:uncaught`.
    pub fn install_panic_hook(&self) {
        reporting::install_panic_hook(self.bus.clone());
    }

    /// Spawn a background task whose failure is announced as `error:unhandled`.
    pub fn spawn_reported<F>(&self, task: impl Into<String>, future: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        reporting::spawn_reported(self.bus.clone(), task, future)
    }
}
