//! Style selection policies.
//!
//! ```text
//! SelectionPolicy::Random    uniform over non-technical styles
//! SelectionPolicy::Classify  classifier sub-call → technical, else uniform
//! ```
//!
//! Randomness comes from the caller's RNG so selection is reproducible under
//! a seeded generator. Nothing is shared between requests.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::ProviderError;
use super::composer;
use super::invoker::ModelInvoker;
use super::styles::{Style, StyleRegistry};

// ── Classification ────────────────────────────────────────────────────────────

/// Classifier verdict for one message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub is_technical: bool,
    pub confidence: f64,
}

impl Classification {
    /// Used whenever the classifier reply cannot be understood.
    pub const NEUTRAL: Classification = Classification { is_technical: false, confidence: 0.5 };

    /// Parse a classifier reply, falling back to [`Classification::NEUTRAL`].
    ///
    /// Tolerates a surrounding Markdown code fence. A confidence outside
    /// `[0, 1]` counts as malformed.
    pub fn parse(raw: &str) -> Self {
        let body = strip_code_fence(raw);
        match serde_json::from_str::<Classification>(body) {
            Ok(c) if (0.0..=1.0).contains(&c.confidence) => c,
            Ok(c) => {
                warn!(confidence = c.confidence, "classifier confidence out of range; using neutral classification");
                Self::NEUTRAL
            }
            Err(e) => {
                warn!(error = %e, raw_len = raw.len(), "unparseable classifier reply; using neutral classification");
                Self::NEUTRAL
            }
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ── Selection ─────────────────────────────────────────────────────────────────

/// The outcome of selection: exactly one style, plus what led to it.
#[derive(Debug, Clone)]
pub struct Selection<'r> {
    pub style: &'r Style,
    pub persona: Option<&'static str>,
    pub classification: Option<Classification>,
}

/// Configured policy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Classify,
    Random,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Classify => "classify",
            PolicyKind::Random => "random",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classify" | "classification" => Ok(PolicyKind::Classify),
            "random" => Ok(PolicyKind::Random),
            other => Err(format!("unknown policy '{other}' (expected classify or random)")),
        }
    }
}

/// Uniform choice over the registry's non-technical styles.
///
/// Uniform over styles, not personas: in `classic`, `shakespeare` is one of
/// two non-technical styles and gets half the picks, while the five `other`
/// personas share the remaining half.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy;

impl RandomPolicy {
    pub fn pick<'r, R: Rng + ?Sized>(&self, registry: &'r StyleRegistry, rng: &mut R) -> Selection<'r> {
        let candidates = registry.non_technical();
        let style = match candidates.choose(rng) {
            Some(style) => *style,
            // Presets always carry non-technical styles; an empty list means
            // a technical-only catalogue, so the whole list is the pool.
            None => pick_style(registry.list_styles(), rng),
        };
        with_persona(style, rng)
    }
}

/// Technical escalation driven by a classifier sub-call.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierPolicy {
    /// Confidence must be strictly greater than this to escalate.
    pub threshold: f64,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self { threshold: 0.6 }
    }
}

impl ClassifierPolicy {
    /// Run the classifier for `content`. Transport failures propagate;
    /// unreadable replies become the neutral classification.
    pub async fn classify(&self, invoker: &ModelInvoker, content: &str) -> Result<Classification, ProviderError> {
        let raw = invoker.invoke(&composer::classification_request(content)).await?;
        let classification = Classification::parse(&raw);
        debug!(
            is_technical = classification.is_technical,
            confidence = classification.confidence,
            "message classified"
        );
        Ok(classification)
    }

    /// Choose a style for an already-known classification.
    pub fn decide<'r, R: Rng + ?Sized>(
        &self,
        registry: &'r StyleRegistry,
        classification: Classification,
        rng: &mut R,
    ) -> Selection<'r> {
        let escalate = classification.is_technical && classification.confidence > self.threshold;
        let technical = if escalate { registry.technical() } else { None };
        let mut selection = match technical {
            Some(style) => with_persona(style, rng),
            None => RandomPolicy.pick(registry, rng),
        };
        selection.classification = Some(classification);
        selection
    }
}

/// The configured selection capability.
///
/// Enum dispatch, same as `LlmProvider`: no trait objects, no `async-trait`.
#[derive(Debug, Clone, Copy)]
pub enum SelectionPolicy {
    Random(RandomPolicy),
    Classify(ClassifierPolicy),
}

impl SelectionPolicy {
    pub fn new(kind: PolicyKind, threshold: f64) -> Self {
        match kind {
            PolicyKind::Random => SelectionPolicy::Random(RandomPolicy),
            PolicyKind::Classify => SelectionPolicy::Classify(ClassifierPolicy { threshold }),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            SelectionPolicy::Random(_) => PolicyKind::Random,
            SelectionPolicy::Classify(_) => PolicyKind::Classify,
        }
    }

    /// Select exactly one style for `content`.
    ///
    /// Only the classify policy touches `invoker`, and only once.
    pub async fn select<'r, R: Rng + ?Sized>(
        &self,
        registry: &'r StyleRegistry,
        invoker: &ModelInvoker,
        content: &str,
        rng: &mut R,
    ) -> Result<Selection<'r>, ProviderError> {
        match self {
            SelectionPolicy::Random(p) => Ok(p.pick(registry, rng)),
            SelectionPolicy::Classify(p) => {
                let classification = p.classify(invoker, content).await?;
                Ok(p.decide(registry, classification, rng))
            }
        }
    }
}

fn pick_style<'r, R: Rng + ?Sized>(styles: &'r [Style], rng: &mut R) -> &'r Style {
    &styles[rng.random_range(0..styles.len())]
}

fn with_persona<'r, R: Rng + ?Sized>(style: &'r Style, rng: &mut R) -> Selection<'r> {
    Selection {
        style,
        persona: style.personas.choose(rng).copied(),
        classification: None,
    }
}
