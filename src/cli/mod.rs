//! CLI argument parsing and command dispatch.

pub mod args;
pub mod chat;
pub mod probe;
pub mod providers;
pub mod say;

use std::sync::Arc;

pub use args::{Cli, Commands};

use crate::core::credentials::CredentialSet;
use crate::core::provider::ProviderRegistry;
use crate::error::Result;
use crate::storage::config::ResolvedConfig;

/// Everything a command needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: ResolvedConfig,
    pub registry: Arc<ProviderRegistry>,
    pub credentials: Arc<CredentialSet>,
}

impl AppContext {
    /// Resolve configuration, build the registry and read credentials.
    ///
    /// # Errors
    /// Returns error if the configuration or the provider registry is invalid.
    /// A missing or unreadable credentials file is not an error.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = ResolvedConfig::resolve(cli)?;
        Self::from_config(config)
    }

    /// # Errors
    /// Returns error if the provider registry is invalid.
    pub fn from_config(config: ResolvedConfig) -> Result<Self> {
        let registry = ProviderRegistry::from_config(&config.providers)?;
        let credentials = CredentialSet::load(&config.credentials_path);
        tracing::debug!(
            providers = registry.len(),
            credentials = credentials.len(),
            "Context loaded"
        );
        Ok(Self {
            config,
            registry: Arc::new(registry),
            credentials: Arc::new(credentials),
        })
    }

    /// Whether output may be colored.
    #[must_use]
    pub fn color(&self) -> bool {
        crate::util::env::should_use_color(self.config.no_color)
    }
}
