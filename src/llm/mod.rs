//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! Every call is a single round trip: no retries, no caching.

pub mod providers;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("llm service is not configured: missing API key")]
    NotConfigured,
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider request timed out after {0}s")]
    Timeout(u64),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

// ── Request shape ─────────────────────────────────────────────────────────────

/// Sampling knobs forwarded verbatim to the provider.
///
/// `None` fields are omitted from the wire request so the provider's own
/// defaults apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

/// Which configured model a request is meant for.
///
/// Classification runs on its own (usually larger) model; generation runs on
/// the faster default model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Classifier,
    Generator,
}

/// Expected shape of the reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// Structured JSON constrained by the given JSON schema.
    Json(Value),
}

/// One provider call: system instruction + the latest user message.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub role: ModelRole,
    pub system: String,
    pub content: String,
    pub params: GenerationParams,
    pub format: ResponseFormat,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    Scripted(providers::scripted::ScriptedProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    Gemini(providers::gemini::GeminiProvider),
}

impl LlmProvider {
    /// Send `request` to the provider and return its raw text reply.
    ///
    /// An empty string is a valid reply; callers decide how to present it.
    pub async fn complete(&self, request: &LlmRequest) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(request).await,
            LlmProvider::Scripted(p) => p.complete(request).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(request).await,
            LlmProvider::Gemini(p) => p.complete(request).await,
        }
    }

    /// Short provider name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::Scripted(_) => "scripted",
            LlmProvider::OpenAiCompatible(_) => "openai",
            LlmProvider::Gemini(_) => "gemini",
        }
    }
}

/// Map a transport error to the provider taxonomy.
pub(crate) fn transport_error(e: reqwest::Error, timeout_seconds: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_seconds)
    } else {
        ProviderError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display_includes_code() {
        let e = ProviderError::Status { status: 503, message: "overloaded".into() };
        assert_eq!(e.to_string(), "HTTP 503: overloaded");
    }

    #[test]
    fn timeout_error_display() {
        assert!(ProviderError::Timeout(60).to_string().contains("60s"));
    }

    #[test]
    fn provider_names() {
        let p = LlmProvider::Dummy(providers::dummy::DummyProvider);
        assert_eq!(p.name(), "dummy");
        let p = LlmProvider::Scripted(providers::scripted::ScriptedProvider::new());
        assert_eq!(p.name(), "scripted");
    }
}
