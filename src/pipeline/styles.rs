//! Style registry — the closed catalogue of response styles.
//!
//! Instruction text lives in `config/prompts/styles/*.txt` and is embedded at
//! compile time; this module only wires tags, personas, and sampling
//! registers together. Adding a style = new prompt file + new table entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::llm::GenerationParams;

// ── Tags ──────────────────────────────────────────────────────────────────────

/// Wire tag carried in `ChatResponse::message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTag {
    Technical,
    Shakespeare,
    Other,
    Absurd,
    Shakespearean,
    Toddler,
    Overcomplicated,
    Random,
}

impl StyleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleTag::Technical => "technical",
            StyleTag::Shakespeare => "shakespeare",
            StyleTag::Other => "other",
            StyleTag::Absurd => "absurd",
            StyleTag::Shakespearean => "shakespearean",
            StyleTag::Toddler => "toddler",
            StyleTag::Overcomplicated => "overcomplicated",
            StyleTag::Random => "random",
        }
    }
}

impl fmt::Display for StyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Sampling registers ────────────────────────────────────────────────────────

/// How much freedom a style gives the model.
///
/// Each register owns fixed generation parameters and the closed band its
/// temperature must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Accurate, structured answers.
    Precise,
    /// A few sentences in someone else's voice.
    Measured,
    /// Short and silly.
    Playful,
    /// Long, unhinged, maximum variance.
    Elaborate,
}

impl Register {
    pub fn params(&self) -> GenerationParams {
        match self {
            Register::Precise => GenerationParams {
                temperature: 0.4,
                max_output_tokens: Some(4096),
                top_p: Some(0.9),
                top_k: None,
            },
            Register::Measured => GenerationParams {
                temperature: 0.9,
                max_output_tokens: Some(512),
                top_p: Some(0.95),
                top_k: Some(40),
            },
            Register::Playful => GenerationParams {
                temperature: 1.0,
                max_output_tokens: Some(384),
                top_p: Some(0.95),
                top_k: Some(40),
            },
            Register::Elaborate => GenerationParams {
                temperature: 1.2,
                max_output_tokens: Some(2048),
                top_p: Some(0.98),
                top_k: Some(64),
            },
        }
    }

    /// Inclusive `(min, max)` temperature band.
    pub fn temperature_band(&self) -> (f32, f32) {
        match self {
            Register::Precise => (0.0, 0.7),
            Register::Measured => (0.7, 1.0),
            Register::Playful => (0.8, 1.2),
            Register::Elaborate => (1.0, 1.5),
        }
    }
}

// ── Style ─────────────────────────────────────────────────────────────────────

/// One response style. Immutable; lives for the whole process.
#[derive(Debug, Clone)]
pub struct Style {
    pub tag: StyleTag,
    /// Instruction template with `{{bot_name}}` / `{{character}}` placeholders.
    pub template: &'static str,
    /// Sub-personas, one picked uniformly per request. Empty = none.
    pub personas: &'static [&'static str],
    pub register: Register,
    /// Shown when the model answers with empty text.
    pub empty_fallback: &'static str,
    /// Constant metadata attached to every successful reply.
    pub metadata: &'static [(&'static str, &'static str)],
}

impl Style {
    pub fn is_technical(&self) -> bool {
        self.tag == StyleTag::Technical
    }
}

const TECHNICAL_TEMPLATE: &str = include_str!("../../config/prompts/styles/technical.txt");
const CHARACTER_TEMPLATE: &str = include_str!("../../config/prompts/styles/character.txt");
const ABSURD_TEMPLATE: &str = include_str!("../../config/prompts/styles/absurd.txt");
const SHAKESPEAREAN_TEMPLATE: &str = include_str!("../../config/prompts/styles/shakespearean.txt");
const TODDLER_TEMPLATE: &str = include_str!("../../config/prompts/styles/toddler.txt");
const OVERCOMPLICATED_TEMPLATE: &str = include_str!("../../config/prompts/styles/overcomplicated.txt");
const RANDOM_TEMPLATE: &str = include_str!("../../config/prompts/styles/random.txt");

const CHARACTER_FALLBACK: &str = "Verily, I find myself at a loss for words, good sir or madam.";

fn classic_styles() -> Vec<Style> {
    vec![
        Style {
            tag: StyleTag::Technical,
            template: TECHNICAL_TEMPLATE,
            personas: &[],
            register: Register::Precise,
            empty_fallback: "I apologize, but I couldn't generate a technical response.",
            metadata: &[("language", "mixed")],
        },
        Style {
            tag: StyleTag::Shakespeare,
            template: CHARACTER_TEMPLATE,
            personas: &["William Shakespeare"],
            register: Register::Measured,
            empty_fallback: CHARACTER_FALLBACK,
            metadata: &[],
        },
        Style {
            tag: StyleTag::Other,
            template: CHARACTER_TEMPLATE,
            personas: &["Oscar Wilde", "Mark Twain", "Winston Churchill", "Albert Einstein", "Maya Angelou"],
            register: Register::Measured,
            empty_fallback: CHARACTER_FALLBACK,
            metadata: &[],
        },
    ]
}

fn chaos_styles() -> Vec<Style> {
    vec![
        Style {
            tag: StyleTag::Absurd,
            template: ABSURD_TEMPLATE,
            personas: &[],
            register: Register::Elaborate,
            empty_fallback: "The soufflé of wisdom has collapsed. Please stir again later.",
            metadata: &[],
        },
        Style {
            tag: StyleTag::Shakespearean,
            template: SHAKESPEAREAN_TEMPLATE,
            personas: &[],
            register: Register::Elaborate,
            empty_fallback: "Alas, the quill is dry and the stage stands empty.",
            metadata: &[],
        },
        Style {
            tag: StyleTag::Toddler,
            template: TODDLER_TEMPLATE,
            personas: &[],
            register: Register::Playful,
            empty_fallback: "Uh-oh. All done. Nap time now.",
            metadata: &[],
        },
        Style {
            tag: StyleTag::Overcomplicated,
            template: OVERCOMPLICATED_TEMPLATE,
            personas: &[],
            register: Register::Elaborate,
            empty_fallback: "The committee has deferred its findings pending further study.",
            metadata: &[],
        },
        Style {
            tag: StyleTag::Random,
            template: RANDOM_TEMPLATE,
            personas: &[],
            register: Register::Elaborate,
            empty_fallback: "Sorry, Sir Whiskers sat on the keyboard.",
            metadata: &[],
        },
    ]
}

// ── Presets ───────────────────────────────────────────────────────────────────

/// Built-in style catalogues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// technical / shakespeare / other, escalated by classification.
    Classic,
    /// absurd / shakespearean / toddler / overcomplicated / random.
    Chaos,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Classic => "classic",
            Preset::Chaos => "chaos",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Preset::Classic),
            "chaos" => Ok(Preset::Chaos),
            other => Err(format!("unknown preset '{other}' (expected classic or chaos)")),
        }
    }
}

/// Fixed texts returned when no style could be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureTexts {
    pub not_configured: String,
    pub upstream: String,
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StyleRegistry {
    preset: Preset,
    styles: Vec<Style>,
    failure_tag: StyleTag,
    failure_texts: FailureTexts,
}

impl StyleRegistry {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Classic => Self {
                preset,
                styles: classic_styles(),
                failure_tag: StyleTag::Other,
                failure_texts: FailureTexts {
                    not_configured: "I apologize, but the AI service is not properly configured. Please check your environment variables.".into(),
                    upstream: "I apologize, but I'm having trouble processing your request right now. Please try again later.".into(),
                },
            },
            Preset::Chaos => Self {
                preset,
                styles: chaos_styles(),
                failure_tag: StyleTag::Absurd,
                failure_texts: FailureTexts {
                    not_configured: "Oh dear, someone forgot to plug in my brain. The AI service is not configured, so please check your environment variables.".into(),
                    upstream: "My thoughts fell into the soup. I'm having trouble answering right now, so please try again later.".into(),
                },
            },
        }
    }

    /// Replace the preset's failure texts with operator-supplied ones.
    pub fn with_failure_texts(mut self, not_configured: Option<String>, upstream: Option<String>) -> Self {
        if let Some(text) = not_configured {
            self.failure_texts.not_configured = text;
        }
        if let Some(text) = upstream {
            self.failure_texts.upstream = text;
        }
        self
    }

    pub fn preset_kind(&self) -> Preset {
        self.preset
    }

    /// All styles, in declaration order.
    pub fn list_styles(&self) -> &[Style] {
        &self.styles
    }

    pub fn get(&self, tag: StyleTag) -> Option<&Style> {
        self.styles.iter().find(|s| s.tag == tag)
    }

    pub fn template_for(&self, tag: StyleTag) -> Option<&'static str> {
        self.get(tag).map(|s| s.template)
    }

    pub fn technical(&self) -> Option<&Style> {
        self.styles.iter().find(|s| s.is_technical())
    }

    /// Styles eligible for random selection.
    pub fn non_technical(&self) -> Vec<&Style> {
        self.styles.iter().filter(|s| !s.is_technical()).collect()
    }

    /// Reserved tag for replies produced without any style.
    pub fn failure_tag(&self) -> StyleTag {
        self.failure_tag
    }

    pub fn failure_texts(&self) -> &FailureTexts {
        &self.failure_texts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PRESETS: [Preset; 2] = [Preset::Classic, Preset::Chaos];

    #[test]
    fn classic_tags_in_order() {
        let r = StyleRegistry::preset(Preset::Classic);
        let tags: Vec<_> = r.list_styles().iter().map(|s| s.tag).collect();
        assert_eq!(tags, [StyleTag::Technical, StyleTag::Shakespeare, StyleTag::Other]);
        assert_eq!(r.failure_tag(), StyleTag::Other);
    }

    #[test]
    fn chaos_has_no_technical_style() {
        let r = StyleRegistry::preset(Preset::Chaos);
        assert!(r.technical().is_none());
        assert_eq!(r.non_technical().len(), 5);
        assert_eq!(r.failure_tag(), StyleTag::Absurd);
    }

    #[test]
    fn tags_are_unique_per_preset() {
        for p in PRESETS {
            let r = StyleRegistry::preset(p);
            let tags: HashSet<_> = r.list_styles().iter().map(|s| s.tag).collect();
            assert_eq!(tags.len(), r.list_styles().len(), "duplicate tag in {p}");
        }
    }

    #[test]
    fn failure_tag_is_a_registered_style() {
        for p in PRESETS {
            let r = StyleRegistry::preset(p);
            assert!(r.get(r.failure_tag()).is_some());
        }
    }

    #[test]
    fn templates_and_fallbacks_are_non_empty() {
        for p in PRESETS {
            let r = StyleRegistry::preset(p);
            for s in r.list_styles() {
                assert!(!s.template.trim().is_empty(), "{} template empty", s.tag);
                assert!(!s.empty_fallback.is_empty(), "{} fallback empty", s.tag);
                assert_eq!(r.template_for(s.tag), Some(s.template));
            }
        }
    }

    #[test]
    fn persona_templates_use_character_placeholder() {
        for p in PRESETS {
            for s in StyleRegistry::preset(p).list_styles() {
                if !s.personas.is_empty() {
                    assert!(s.template.contains("{{character}}"), "{} lacks {{character}}", s.tag);
                }
            }
        }
    }

    #[test]
    fn unknown_tag_lookup_is_none() {
        let r = StyleRegistry::preset(Preset::Chaos);
        assert!(r.get(StyleTag::Technical).is_none());
        assert!(r.template_for(StyleTag::Shakespeare).is_none());
    }

    #[test]
    fn register_params_sit_inside_band() {
        for reg in [Register::Precise, Register::Measured, Register::Playful, Register::Elaborate] {
            let (lo, hi) = reg.temperature_band();
            let t = reg.params().temperature;
            assert!((lo..=hi).contains(&t), "{reg:?} temperature {t} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn tag_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&StyleTag::Overcomplicated).unwrap(), "\"overcomplicated\"");
        for p in PRESETS {
            for s in StyleRegistry::preset(p).list_styles() {
                let json = serde_json::to_string(&s.tag).unwrap();
                assert_eq!(json, format!("\"{}\"", s.tag.as_str()));
            }
        }
    }

    #[test]
    fn preset_parses_case_insensitively() {
        assert_eq!("Chaos".parse::<Preset>(), Ok(Preset::Chaos));
        assert_eq!(" classic ".parse::<Preset>(), Ok(Preset::Classic));
        assert!("mayhem".parse::<Preset>().is_err());
    }

    #[test]
    fn failure_text_overrides() {
        let r = StyleRegistry::preset(Preset::Classic).with_failure_texts(Some("nope".into()), None);
        assert_eq!(r.failure_texts().not_configured, "nope");
        assert!(r.failure_texts().upstream.starts_with("I apologize"));
    }
}
