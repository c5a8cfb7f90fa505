//! Google Generative Language (Gemini) provider.
//!
//! `POST {api_base_url}/models/{model}:generateContent`, authenticated with
//! the `x-goog-api-key` header. Structured classification replies use
//! `responseMimeType = "application/json"` plus a `responseSchema`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::llm::{LlmRequest, ModelRole, ProviderError, ResponseFormat, transport_error};

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_base_url: String,
    model: String,
    classifier_model: String,
    timeout_seconds: u64,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(
        api_base_url: String,
        model: String,
        classifier_model: String,
        timeout_seconds: u64,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, classifier_model, timeout_seconds, api_key })
    }

    /// Endpoint for `model`; a leading `models/` in the name is tolerated.
    fn model_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:generateContent", self.api_base_url.trim_end_matches('/'))
    }

    pub async fn complete(&self, request: &LlmRequest) -> Result<String, ProviderError> {
        let model = match request.role {
            ModelRole::Classifier => &self.classifier_model,
            ModelRole::Generator => &self.model,
        };
        let url = self.model_url(model);

        let (response_mime_type, response_schema) = match &request.format {
            ResponseFormat::Text => (None, None),
            ResponseFormat::Json(schema) => (Some("application/json"), Some(schema.clone())),
        };

        let payload = GenerateContentRequest {
            system_instruction: Content::text(None, &request.system),
            contents: vec![Content::text(Some("user"), &request.content)],
            generation_config: GenerationConfig {
                temperature: Some(request.params.temperature),
                top_p: request.params.top_p,
                top_k: request.params.top_k,
                max_output_tokens: request.params.max_output_tokens,
                response_mime_type,
                response_schema,
                thinking_config: thinking_config(request.role, model),
            },
        };

        debug!(%model, temperature = request.params.temperature, content_len = request.content.len(), "sending Gemini request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full Gemini request payload");
        }

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(%url, error = %e, "Gemini HTTP request failed (transport)");
                transport_error(e, self.timeout_seconds)
            })?;
        let response = check_status(response).await?;

        let parsed = response.json::<GenerateContentResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize Gemini response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(candidates = parsed.candidates.len(), "received Gemini response");
        Ok(parsed.text())
    }
}

/// Thinking tokens count against `maxOutputTokens` on 2.5 models, so a small
/// generation cap can end with `MAX_TOKENS` and no text. Generation turns
/// thinking off; `pro` models reject a zero budget and keep their default.
fn thinking_config(role: ModelRole, model: &str) -> Option<ThinkingConfig> {
    match role {
        ModelRole::Generator if !model.contains("-pro") => Some(ThinkingConfig { thinking_budget: 0 }),
        _ => None,
    }
}

/// Map a non-2xx response to [`ProviderError::Status`], decoding the
/// `{"error": {...}}` envelope when present.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => match env.error.status {
            Some(s) => format!("{} [status={s}]", env.error.message),
            None => env.error.message,
        },
        Err(_) => body,
    };

    error!(%status, %message, "Gemini request returned HTTP error");
    Err(ProviderError::Status { status: status.as_u16(), message })
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![Part { text: Some(text.to_string()) }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, trimmed.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationParams;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base: &str) -> GeminiProvider {
        GeminiProvider::new(
            base.to_string(),
            "gemini-2.5-flash".into(),
            "gemini-2.5-pro".into(),
            5,
            "g-key".into(),
        )
        .unwrap()
    }

    fn request(role: ModelRole, format: ResponseFormat) -> LlmRequest {
        LlmRequest {
            role,
            system: "You are WhyBot.".into(),
            content: "why is the sky blue?".into(),
            params: GenerationParams {
                temperature: 1.2,
                max_output_tokens: Some(2048),
                top_p: Some(0.98),
                top_k: Some(64),
            },
            format,
        }
    }

    #[test]
    fn model_url_tolerates_prefix_and_trailing_slash() {
        let p = provider("https://generativelanguage.googleapis.com/v1beta/");
        assert_eq!(
            p.model_url("models/gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Hark, "}, {"text": "a bug! "}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(parsed.text(), "Hark, a bug!");
    }

    #[test]
    fn response_without_candidates_is_empty() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(parsed.text(), "");
    }

    #[tokio::test]
    async fn generation_request_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "You are WhyBot."}]},
                "contents": [{"role": "user", "parts": [{"text": "why is the sky blue?"}]}],
                "generationConfig": {
                    "maxOutputTokens": 2048,
                    "topK": 64,
                    "thinkingConfig": {"thinkingBudget": 0}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Because the cat said so."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server.uri())
            .complete(&request(ModelRole::Generator, ResponseFormat::Text))
            .await
            .unwrap();
        assert_eq!(text, "Because the cat said so.");
    }

    #[tokio::test]
    async fn classification_request_uses_json_mode_and_classifier_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-pro:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": {"type": "object"}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"isTechnical\": false, \"confidence\": 0.2}"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server.uri())
            .complete(&request(ModelRole::Classifier, ResponseFormat::Json(json!({"type": "object"}))))
            .await
            .unwrap();
        assert!(text.contains("\"confidence\": 0.2"));
    }

    #[tokio::test]
    async fn classifier_keeps_default_thinking() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{}"}]}}]
            })))
            .mount(&server)
            .await;

        provider(&server.uri())
            .complete(&request(ModelRole::Classifier, ResponseFormat::Json(json!({"type": "object"}))))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn pro_generator_keeps_default_thinking() {
        assert!(thinking_config(ModelRole::Generator, "gemini-2.5-pro").is_none());
        assert!(thinking_config(ModelRole::Generator, "models/gemini-2.5-flash").is_some());
    }

    #[tokio::test]
    async fn unparseable_error_body_is_kept_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream connect error"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(&request(ModelRole::Generator, ResponseFormat::Text))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Status { status: 503, ref message } if message == "upstream connect error"
        ));
    }

    #[tokio::test]
    async fn error_envelope_becomes_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(&request(ModelRole::Generator, ResponseFormat::Text))
            .await
            .unwrap_err();
        match err {
            ProviderError::Status { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("API key not valid"));
                assert!(message.contains("INVALID_ARGUMENT"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_request_error() {
        // Port 9 (discard) is not served by the test environment.
        let err = provider("http://127.0.0.1:9")
            .complete(&request(ModelRole::Generator, ResponseFormat::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Request(_) | ProviderError::Timeout(_)));
    }
}
