//! Prompt composition: style template + variables → system instruction and
//! generation parameters.
//!
//! Variable substitution uses `{{key}}` syntax and is applied once at
//! [`build()`](PromptBuilder::build) time, after all fragments are joined.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::llm::{GenerationParams, LlmRequest, ModelRole, ResponseFormat};
use super::styles::Style;

const SEPARATOR: &str = "\n\n";

const CLASSIFIER_TEMPLATE: &str = include_str!("../../config/prompts/classifier.txt");

/// Sampling for the classification sub-call: as deterministic as the
/// provider allows.
pub const CLASSIFIER_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.0,
    max_output_tokens: None,
    top_p: None,
    top_k: None,
};

/// Fluent builder that assembles a prompt from text fragments.
pub struct PromptBuilder {
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self { parts: Vec::new(), vars: HashMap::new() }
    }

    /// Append a text fragment. Blank fragments are dropped.
    pub fn append(mut self, text: impl Into<String>) -> Self {
        let s = text.into();
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
        self
    }

    /// Register `{{key}}` → `value` substitution pairs applied at build time.
    pub fn with_vars<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (k, v) in vars {
            self.vars.insert(k.to_string(), v.to_string());
        }
        self
    }

    /// Join all fragments with blank lines and apply variable substitution.
    pub fn build(self) -> String {
        let mut prompt = self.parts.join(SEPARATOR);
        for (k, v) in &self.vars {
            let placeholder = format!("{{{{{k}}}}}");
            prompt = prompt.replace(&placeholder, v);
        }
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Instruction + parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    pub system_instruction: String,
    pub params: GenerationParams,
}

impl ComposedPrompt {
    /// Pair with the user's message to form the generation request.
    pub fn into_request(self, content: &str) -> LlmRequest {
        LlmRequest {
            role: ModelRole::Generator,
            system: self.system_instruction,
            content: content.to_string(),
            params: self.params,
            format: ResponseFormat::Text,
        }
    }
}

/// Render `style` for `bot_name`, filling the persona if one was picked.
///
/// Pure: the same inputs always give the same prompt.
pub fn compose(bot_name: &str, style: &Style, persona: Option<&str>) -> ComposedPrompt {
    let mut vars = vec![("bot_name", bot_name)];
    if let Some(name) = persona {
        vars.push(("character", name));
    }
    ComposedPrompt {
        system_instruction: PromptBuilder::new().append(style.template).with_vars(vars).build(),
        params: style.register.params(),
    }
}

/// JSON schema the classifier reply must follow.
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "isTechnical": { "type": "boolean" },
            "confidence": { "type": "number" }
        },
        "required": ["isTechnical", "confidence"]
    })
}

/// The classification sub-call for `content`.
pub fn classification_request(content: &str) -> LlmRequest {
    LlmRequest {
        role: ModelRole::Classifier,
        system: PromptBuilder::new().append(CLASSIFIER_TEMPLATE).build(),
        content: content.to_string(),
        params: CLASSIFIER_PARAMS,
        format: ResponseFormat::Json(classification_schema()),
    }
}
