//! Response normalization: raw model output or failure → [`ChatResponse`].
//!
//! Every path ends in a valid `ChatResponse`; nothing here can fail.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::llm::ProviderError;
use super::selector::Selection;
use super::styles::{FailureTexts, StyleRegistry, StyleTag};

/// `metadata.error` when the credential is missing.
pub const ERROR_API_KEY_MISSING: &str = "API_KEY_MISSING";
/// `metadata.error` for any upstream failure.
pub const ERROR_API: &str = "API_ERROR";

/// The pipeline's output contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub content: String,
    pub message_type: StyleTag,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ChatResponse {
    /// `metadata.error`, if this is a failure response.
    pub fn error_kind(&self) -> Option<&str> {
        self.metadata.get("error").and_then(Value::as_str)
    }

    pub fn is_failure(&self) -> bool {
        self.error_kind().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    failure_tag: StyleTag,
    texts: FailureTexts,
}

impl Normalizer {
    pub fn new(registry: &StyleRegistry) -> Self {
        Self {
            failure_tag: registry.failure_tag(),
            texts: registry.failure_texts().clone(),
        }
    }

    /// Map the generation outcome for `selection` into a response.
    pub fn normalize(&self, outcome: Result<String, ProviderError>, selection: &Selection<'_>) -> ChatResponse {
        match outcome {
            Ok(raw) => self.success(raw, selection),
            Err(e) => self.failure(&e),
        }
    }

    /// A successful generation. Empty text becomes the style's fallback line,
    /// still tagged with the style that was used.
    pub fn success(&self, raw: String, selection: &Selection<'_>) -> ChatResponse {
        let style = selection.style;
        let content = if raw.trim().is_empty() {
            style.empty_fallback.to_string()
        } else {
            raw
        };

        let mut metadata = Map::new();
        metadata.insert("style".into(), json!(style.tag));
        for (key, value) in style.metadata {
            metadata.insert((*key).into(), json!(value));
        }
        if let Some(persona) = selection.persona {
            metadata.insert("character".into(), json!(persona));
        }
        if let Some(classification) = selection.classification {
            metadata.insert("classification".into(), json!(classification));
        }

        ChatResponse { content, message_type: style.tag, metadata }
    }

    /// A failed request, tagged with the reserved failure tag.
    pub fn failure(&self, error: &ProviderError) -> ChatResponse {
        let mut metadata = Map::new();
        let content = match error {
            ProviderError::NotConfigured => {
                metadata.insert("error".into(), json!(ERROR_API_KEY_MISSING));
                self.texts.not_configured.clone()
            }
            other => {
                metadata.insert("error".into(), json!(ERROR_API));
                metadata.insert("details".into(), json!(other.to_string()));
                self.texts.upstream.clone()
            }
        };
        ChatResponse { content, message_type: self.failure_tag, metadata }
    }
}
