//! Response generation pipeline.
//!
//! ```text
//! Start → Selecting → Composing → Invoking → Normalizing → Done
//!            │                        │
//!            └──── provider error ────┴──────→ Normalizing (failure)
//! ```
//!
//! [`ResponsePipeline::respond`] never fails: every path ends in a
//! [`ChatResponse`]. There is no retry edge.

pub mod composer;
pub mod invoker;
pub mod normalizer;
pub mod selector;
pub mod styles;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::llm::ProviderError;

pub use invoker::ModelInvoker;
pub use normalizer::{ChatResponse, ERROR_API, ERROR_API_KEY_MISSING, Normalizer};
pub use selector::{Classification, PolicyKind, Selection, SelectionPolicy};
pub use styles::{Preset, Style, StyleRegistry, StyleTag};

/// Per-request pipeline stage, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Selecting,
    Composing,
    Invoking,
    Normalizing,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Selecting => "selecting",
            Stage::Composing => "composing",
            Stage::Invoking => "invoking",
            Stage::Normalizing => "normalizing",
            Stage::Done => "done",
        }
    }
}

/// Immutable after construction; share it behind an `Arc` across requests.
#[derive(Debug, Clone)]
pub struct ResponsePipeline {
    bot_name: String,
    registry: StyleRegistry,
    policy: SelectionPolicy,
    invoker: ModelInvoker,
    normalizer: Normalizer,
}

impl ResponsePipeline {
    pub fn new(bot_name: impl Into<String>, config: &PipelineConfig, invoker: ModelInvoker) -> Self {
        let registry = StyleRegistry::preset(config.preset)
            .with_failure_texts(config.not_configured_text.clone(), config.upstream_error_text.clone());
        let normalizer = Normalizer::new(&registry);
        Self {
            bot_name: bot_name.into(),
            registry,
            policy: SelectionPolicy::new(config.policy, config.technical_threshold),
            invoker,
            normalizer,
        }
    }

    pub fn registry(&self) -> &StyleRegistry {
        &self.registry
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    /// Answer one user message with a fresh OS-seeded RNG.
    pub async fn respond(&self, conversation_id: &str, content: &str) -> ChatResponse {
        let mut rng = StdRng::from_os_rng();
        self.respond_with_rng(conversation_id, content, &mut rng).await
    }

    /// Answer one user message, drawing every random choice from `rng`.
    pub async fn respond_with_rng<R: Rng + ?Sized>(
        &self,
        conversation_id: &str,
        content: &str,
        rng: &mut R,
    ) -> ChatResponse {
        let span = info_span!(
            "respond",
            %conversation_id,
            preset = %self.registry.preset_kind(),
            policy = %self.policy.kind(),
        );
        self.run(content, rng).instrument(span).await
    }

    async fn run<R: Rng + ?Sized>(&self, content: &str, rng: &mut R) -> ChatResponse {
        if !self.invoker.is_configured() {
            warn!("llm service not configured; returning fixed response");
            return self.normalizer.failure(&ProviderError::NotConfigured);
        }

        debug!(stage = Stage::Selecting.as_str(), content_len = content.len());
        let selection = match self.policy.select(&self.registry, &self.invoker, content, rng).await {
            Ok(selection) => selection,
            Err(e) => {
                error!(error = %e, "classification call failed");
                return self.normalizer.failure(&e);
            }
        };

        debug!(
            stage = Stage::Composing.as_str(),
            style = %selection.style.tag,
            persona = selection.persona.unwrap_or("-"),
        );
        let prompt = composer::compose(&self.bot_name, selection.style, selection.persona);

        debug!(stage = Stage::Invoking.as_str(), temperature = prompt.params.temperature);
        let outcome = self.invoker.invoke(&prompt.into_request(content)).await;
        if let Err(e) = &outcome {
            error!(error = %e, style = %selection.style.tag, "generation call failed");
        }

        debug!(stage = Stage::Normalizing.as_str());
        let response = self.normalizer.normalize(outcome, &selection);

        info!(
            stage = Stage::Done.as_str(),
            message_type = %response.message_type,
            failed = response.is_failure(),
            "response ready"
        );
        response
    }
}
