//! Model invoker — the only component that talks to the provider.
//!
//! One call, one round trip: no retries, no caching. Without a credential the
//! invoker is built unconfigured and answers every call with
//! [`ProviderError::NotConfigured`] without touching the network.

use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, LlmRequest, ProviderError, providers};

#[derive(Debug, Clone)]
pub struct ModelInvoker {
    provider: Option<LlmProvider>,
}

impl ModelInvoker {
    pub fn new(provider: LlmProvider) -> Self {
        Self { provider: Some(provider) }
    }

    pub fn unconfigured() -> Self {
        Self { provider: None }
    }

    /// Build from config. A missing API key yields an unconfigured invoker
    /// (logged once here); any other provider error is fatal.
    pub fn from_config(config: &LlmConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        match providers::build(config, api_key) {
            Ok(provider) => Ok(Self::new(provider)),
            Err(ProviderError::NotConfigured) => {
                warn!(provider = %config.provider, "API key is not set; chat functionality will be limited");
                Ok(Self::unconfigured())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Provider name, or `"unconfigured"`.
    pub fn provider_name(&self) -> &'static str {
        self.provider.as_ref().map_or("unconfigured", LlmProvider::name)
    }

    pub async fn invoke(&self, request: &LlmRequest) -> Result<String, ProviderError> {
        let Some(provider) = &self.provider else {
            return Err(ProviderError::NotConfigured);
        };
        debug!(
            provider = provider.name(),
            role = ?request.role,
            system_len = request.system.len(),
            "invoking model"
        );
        provider.complete(request).await
    }
}
