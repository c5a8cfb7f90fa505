//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `-f`), then applies `WHYBOT_LOG_LEVEL`,
//! `WHYBOT_PRESET` and `WHYBOT_POLICY` overrides. The API key is env-only.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;
use crate::pipeline::{PolicyKind, Preset, StyleRegistry};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Endpoint + model names for one hosted provider.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL (Gemini) or full chat completions URL (OpenAI).
    pub api_base_url: String,
    /// Model used for generation.
    pub model: String,
    /// Model used for the classification sub-call.
    pub classifier_model: String,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"gemini"`, `"openai"`, `"dummy"`).
    /// Maps to `default` in `[llm]`.
    pub provider: String,
    /// Per-request HTTP timeout in seconds; expiry is an upstream failure.
    pub timeout_seconds: u64,
    pub gemini: EndpointConfig,
    pub openai: EndpointConfig,
}

/// Response pipeline configuration (`[pipeline]`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub preset: Preset,
    pub policy: PolicyKind,
    /// Classifier confidence must exceed this to pick the technical style.
    pub technical_threshold: f64,
    /// Replaces the preset's "service not configured" reply.
    pub not_configured_text: Option<String>,
    /// Replaces the preset's upstream failure apology.
    pub upstream_error_text: Option<String>,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    /// Append logs here instead of stderr.
    pub log_file: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    /// API key for the active provider — `None` degrades every request to
    /// the fixed "not configured" reply. Never sourced from TOML.
    pub llm_api_key: Option<String>,
}

/// Values taken from the environment, passed explicitly so tests need not
/// mutate process env.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub preset: Option<String>,
    pub policy: Option<String>,
    pub gemini_api_key: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("WHYBOT_LOG_LEVEL").ok(),
            preset: env::var("WHYBOT_PRESET").ok(),
            policy: env::var("WHYBOT_POLICY").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            llm_api_key: env::var("LLM_API_KEY").ok(),
        }
    }

    /// Key for `provider`; empty strings count as unset.
    fn api_key_for(&self, provider: &str) -> Option<String> {
        let key = match provider {
            "gemini" => self.gemini_api_key.clone().or_else(|| self.llm_api_key.clone()),
            _ => self.llm_api_key.clone(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    bot: RawBot,
    #[serde(default)]
    pipeline: RawPipeline,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawBot {
    #[serde(default = "default_bot_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_file: Option<PathBuf>,
}

impl Default for RawBot {
    fn default() -> Self {
        Self { name: default_bot_name(), log_level: default_log_level(), log_file: None }
    }
}

#[derive(Deserialize)]
struct RawPipeline {
    #[serde(default = "default_preset")]
    preset: String,
    /// Defaults to the preset's own policy.
    #[serde(default)]
    policy: Option<String>,
    #[serde(default = "default_threshold")]
    technical_threshold: f64,
    #[serde(default)]
    not_configured_text: Option<String>,
    #[serde(default)]
    upstream_error_text: Option<String>,
}

impl Default for RawPipeline {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            policy: None,
            technical_threshold: default_threshold(),
            not_configured_text: None,
            upstream_error_text: None,
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    gemini: RawEndpoint,
    #[serde(default)]
    openai: RawEndpoint,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            timeout_seconds: default_timeout_seconds(),
            gemini: RawEndpoint::default(),
            openai: RawEndpoint::default(),
        }
    }
}

/// Missing fields fall back per provider in [`RawEndpoint::resolve`].
#[derive(Deserialize, Default)]
struct RawEndpoint {
    api_base_url: Option<String>,
    model: Option<String>,
    classifier_model: Option<String>,
}

impl RawEndpoint {
    fn resolve(self, base_url: &str, model: &str, classifier_model: &str) -> EndpointConfig {
        EndpointConfig {
            api_base_url: self.api_base_url.unwrap_or_else(|| base_url.to_string()),
            model: self.model.unwrap_or_else(|| model.to_string()),
            classifier_model: self.classifier_model.unwrap_or_else(|| classifier_model.to_string()),
        }
    }
}

fn default_bot_name() -> String {
    "WhyBot".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_preset() -> String {
    "classic".to_string()
}
fn default_threshold() -> f64 {
    0.6
}
fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_timeout_seconds() -> u64 {
    60
}

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.5-flash";
const GEMINI_CLASSIFIER_MODEL: &str = "gemini-2.5-pro";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-4o-mini";

const KNOWN_PROVIDERS: &[&str] = &["gemini", "openai", "openai-compatible", "dummy"];

/// Default preset policy: classification for `classic`, random for `chaos`.
pub fn default_policy(preset: Preset) -> PolicyKind {
    match preset {
        Preset::Classic => PolicyKind::Classify,
        Preset::Chaos => PolicyKind::Random,
    }
}

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides. A missing default file means built-in defaults; a
/// missing explicit path is an error.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();
    match path {
        Some(p) => load_from(Path::new(p), &overrides),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from(Path::new(DEFAULT_CONFIG_PATH), &overrides),
        None => resolve(RawConfig::default(), &overrides),
    }
}

/// Internal loader — accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    load_str(&raw, overrides)
        .map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
}

/// Parse and resolve TOML text.
pub fn load_str(raw: &str, overrides: &Overrides) -> Result<Config, AppError> {
    let parsed: RawConfig = toml::from_str(raw).map_err(|e| AppError::Config(format!("parse error: {e}")))?;
    resolve(parsed, overrides)
}

fn resolve(parsed: RawConfig, overrides: &Overrides) -> Result<Config, AppError> {
    let preset: Preset = overrides
        .preset
        .as_deref()
        .unwrap_or(&parsed.pipeline.preset)
        .parse()
        .map_err(AppError::Config)?;

    let policy = match overrides.policy.as_deref().or(parsed.pipeline.policy.as_deref()) {
        Some(p) => p.parse::<PolicyKind>().map_err(AppError::Config)?,
        None => default_policy(preset),
    };

    let threshold = parsed.pipeline.technical_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::Config(format!("technical_threshold must be within [0, 1], got {threshold}")));
    }

    if policy == PolicyKind::Classify && StyleRegistry::preset(preset).technical().is_none() {
        return Err(AppError::Config(format!(
            "policy 'classify' needs a preset with a technical style; '{preset}' has none"
        )));
    }

    let log_level = overrides.log_level.clone().unwrap_or(parsed.bot.log_level);
    logger::parse_level(&log_level).map_err(|_| AppError::Config(format!("unrecognised log level '{log_level}'")))?;

    let provider = parsed.llm.provider;
    if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
        return Err(AppError::Config(format!("unknown llm provider '{provider}'")));
    }
    let llm_api_key = overrides.api_key_for(&provider);

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level,
        log_file: parsed.bot.log_file,
        pipeline: PipelineConfig {
            preset,
            policy,
            technical_threshold: threshold,
            not_configured_text: parsed.pipeline.not_configured_text,
            upstream_error_text: parsed.pipeline.upstream_error_text,
        },
        llm: LlmConfig {
            timeout_seconds: parsed.llm.timeout_seconds,
            gemini: parsed.llm.gemini.resolve(GEMINI_BASE_URL, GEMINI_MODEL, GEMINI_CLASSIFIER_MODEL),
            openai: parsed.llm.openai.resolve(OPENAI_BASE_URL, OPENAI_MODEL, OPENAI_MODEL),
            provider,
        },
        llm_api_key,
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — dummy LLM, no API keys, no external calls.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            bot_name: "WhyBot".into(),
            log_level: "info".into(),
            log_file: None,
            pipeline: PipelineConfig {
                preset: Preset::Classic,
                policy: PolicyKind::Classify,
                technical_threshold: 0.6,
                not_configured_text: None,
                upstream_error_text: None,
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                timeout_seconds: 1,
                gemini: EndpointConfig {
                    api_base_url: "http://localhost:0/v1beta".into(),
                    model: "test-model".into(),
                    classifier_model: "test-classifier".into(),
                },
                openai: EndpointConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    classifier_model: "test-classifier".into(),
                },
            },
            llm_api_key: None,
        }
    }
}
