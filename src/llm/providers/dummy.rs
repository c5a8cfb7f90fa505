//! Dummy LLM provider — echoes input back prefixed with `[echo]`.
//! Used for local runs without an API key.
//!
//! Classification requests get the same echo, which is not valid JSON, so the
//! selector falls back to the neutral classification.

use crate::llm::{LlmRequest, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, request: &LlmRequest) -> Result<String, ProviderError> {
        Ok(format!("[echo] {}", request.content))
    }
}
