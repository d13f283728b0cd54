//! Provider factory: turns a resolved credential into a callable adapter.
//!
//! The orchestrator only sees [`ProviderFactory`], so tests can swap in
//! scripted providers without any HTTP.
//!
//! ## Usage
//!
//! ```ignore
//! let factory = HttpProviderFactory::from_config(&config)?;
//! let provider = factory.create(credential);
//! let response = provider.generate(&request).await;
//! ```

use council_core::ProviderIdentity;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::secrets::ApiCredential;
use super::{LlmProvider, ProviderAdapter, ProviderError};
use crate::config::{EngineConfig, ProviderSettings, DEFAULT_PROVIDER_TIMEOUT};

/// Creates provider instances from resolved credentials.
pub trait ProviderFactory: Send + Sync {
    /// Build the adapter for `credential.provider()`.
    fn create(&self, credential: ApiCredential) -> Arc<dyn LlmProvider>;
}

/// Factory for the real HTTP adapters.
///
/// One connection pool is shared by every adapter it creates.
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    client: reqwest::Client,
    settings: BTreeMap<ProviderIdentity, ProviderSettings>,
}

impl HttpProviderFactory {
    pub fn new(settings: BTreeMap<ProviderIdentity, ProviderSettings>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_PROVIDER_TIMEOUT)
            .user_agent(concat!("council/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ProviderError> {
        Self::new(config.providers.clone())
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, credential: ApiCredential) -> Arc<dyn LlmProvider> {
        let settings = self
            .settings
            .get(&credential.provider())
            .cloned()
            .unwrap_or_default();
        Arc::new(ProviderAdapter::new(credential, &settings, self.client.clone()))
    }
}
