//! End-to-end pipeline runs against a mocked Gemini endpoint.

use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use whybot::config::{self, Config, Overrides};
use whybot::pipeline::{ERROR_API, ERROR_API_KEY_MISSING, ModelInvoker, ResponsePipeline, StyleTag};

const CLASSIFIER_PATH: &str = "/v1beta/models/gemini-2.5-pro:generateContent";
const GENERATOR_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

fn load_config(server_uri: &str, preset: &str, api_key: Option<&str>) -> Config {
    let toml = format!(
        "[pipeline]\npreset = \"{preset}\"\n\n[llm]\ndefault = \"gemini\"\ntimeout_seconds = 5\n\n[llm.gemini]\napi_base_url = \"{server_uri}/v1beta\"\n"
    );
    let overrides = Overrides { gemini_api_key: api_key.map(String::from), ..Overrides::default() };
    config::load_str(&toml, &overrides).unwrap()
}

fn build(cfg: &Config) -> ResponsePipeline {
    let invoker = ModelInvoker::from_config(&cfg.llm, cfg.llm_api_key.clone()).unwrap();
    ResponsePipeline::new(cfg.bot_name.clone(), &cfg.pipeline, invoker)
}

#[tokio::test]
async fn technical_question_gets_technical_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CLASSIFIER_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(r#"{"isTechnical": true, "confidence": 0.92}"#)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATOR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Check the loop bound: use `<` instead of `<=`.")))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = build(&load_config(&server.uri(), "classic", Some("test-key")));
    let r = pipeline.respond("conv-a", "fix my off-by-one bug").await;

    assert_eq!(r.message_type, StyleTag::Technical);
    assert!(!r.content.is_empty());
    assert!(!r.is_failure());

    let requests = server.received_requests().await.unwrap();
    let generation = requests.iter().find(|r| r.url.path() == GENERATOR_PATH).unwrap();
    let body: Value = serde_json::from_slice(&generation.body).unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "fix my off-by-one bug");
    let system = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
    assert!(system.contains("WhyBot"));
    assert!(!system.contains("{{"));
}

#[tokio::test]
async fn non_technical_question_is_never_technical() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CLASSIFIER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(r#"{"isTechnical": false, "confidence": 0.1}"#)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATOR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Cloudy with a chance of wit.")))
        .mount(&server)
        .await;

    let pipeline = build(&load_config(&server.uri(), "classic", Some("test-key")));
    for _ in 0..5 {
        let r = pipeline.respond("conv-b", "what's the weather").await;
        assert_ne!(r.message_type, StyleTag::Technical);
        assert!(matches!(r.message_type, StyleTag::Shakespeare | StyleTag::Other));
        assert_eq!(r.content, "Cloudy with a chance of wit.");
    }
}

#[tokio::test]
async fn missing_key_returns_fixed_text_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let pipeline = build(&load_config(&server.uri(), "classic", None));
    let r = pipeline.respond("conv-c", "hello").await;

    assert_eq!(
        r.content,
        "I apologize, but the AI service is not properly configured. Please check your environment variables."
    );
    assert_eq!(r.error_kind(), Some(ERROR_API_KEY_MISSING));
}

#[tokio::test]
async fn upstream_500_becomes_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATOR_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "backend overloaded", "status": "INTERNAL" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    // chaos defaults to the random policy: no classifier call
    let pipeline = build(&load_config(&server.uri(), "chaos", Some("test-key")));
    let r = pipeline.respond("conv-d", "why is the sky blue").await;

    assert_eq!(r.error_kind(), Some(ERROR_API));
    assert_eq!(r.message_type, StyleTag::Absurd);
    assert_eq!(r.content, pipeline.registry().failure_texts().upstream);
    assert!(r.metadata["details"].as_str().unwrap().contains("backend overloaded"));
}

#[tokio::test]
async fn empty_generation_uses_style_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATOR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let pipeline = build(&load_config(&server.uri(), "chaos", Some("test-key")));
    let r = pipeline.respond("conv-e", "why?").await;

    let style = pipeline.registry().get(r.message_type).unwrap();
    assert_eq!(r.content, style.empty_fallback);
    assert!(!r.is_failure());
}

#[tokio::test]
async fn slow_upstream_times_out_as_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATOR_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply("too late"))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let toml = format!(
        "[pipeline]\npreset = \"chaos\"\n\n[llm]\ndefault = \"gemini\"\ntimeout_seconds = 1\n\n[llm.gemini]\napi_base_url = \"{}/v1beta\"\n",
        server.uri()
    );
    let overrides = Overrides { gemini_api_key: Some("test-key".into()), ..Overrides::default() };
    let pipeline = build(&config::load_str(&toml, &overrides).unwrap());
    let r = pipeline.respond("conv-f", "why?").await;

    assert_eq!(r.error_kind(), Some(ERROR_API));
    assert_eq!(r.message_type, StyleTag::Absurd);
    assert_eq!(r.metadata["details"], "provider request timed out after 1s");
}
