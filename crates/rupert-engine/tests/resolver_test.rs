//! Model resolver against a mock Gemini API.

use rupert_common::protocol::{ActionKind, IntentSource, Target};
use rupert_engine::interpreter::{Interpreter, InterpreterMode};
use rupert_engine::resolver::{
    BrowserContext, GeminiClient, IntentResolver, ModelClient, ModelEndpoint, ModelError,
};
use rupert_parser::CommandGrammar;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "AIzaSyTestKeyForTheMockServer000000000";

fn reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] }
        }]
    })
}

fn resolver_for(server: &MockServer) -> IntentResolver {
    let client = GeminiClient::new(Some(KEY.to_string())).with_base_url(server.uri());
    IntentResolver::new(Arc::new(client))
}

// ────────────────────────────────────────────────────────────────────────────
// Endpoint fallback
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_primary_404_uses_fallback_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .and(query_param("key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            "```json\n{\"success\": true, \"action\": \"navigate\", \"url\": \"https://github.com\", \"confidence\": 0.9, \"explanation\": \"Opening GitHub\"}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let intent = resolver_for(&server)
        .resolve("take me to my code hosting site", &BrowserContext::default())
        .await;

    assert_eq!(intent.action, ActionKind::Navigate);
    assert_eq!(intent.url.as_deref(), Some("https://github.com"));
    assert_eq!(intent.source, IntentSource::Llm);
    assert_eq!(intent.confidence, 0.9);
    assert_eq!(intent.explanation, "Opening GitHub");
}

#[tokio::test]
async fn test_prose_everywhere_falls_back_to_keywords() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply("Sure! I would be happy to open Google for you.")),
        )
        .expect(4)
        .mount(&server)
        .await;

    let intent = resolver_for(&server)
        .resolve("open google", &BrowserContext::default())
        .await;

    assert_eq!(intent.action, ActionKind::Navigate);
    assert_eq!(intent.url.as_deref(), Some("https://google.com"));
    assert_eq!(intent.source, IntentSource::ManualFallback);
}

#[tokio::test]
async fn test_everything_fails_gives_unknown() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let intent = resolver_for(&server)
        .resolve("make me a sandwich", &BrowserContext::default())
        .await;

    assert!(intent.is_unknown());
    assert_eq!(intent.confidence, 0.0);
    assert!(intent.explanation.contains("rephrasing"));
}

#[tokio::test]
async fn test_declined_reply_tries_next_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            r#"{"success": false, "action": "unknown", "message": "unclear"}"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            r#"{"success": true, "action": "scroll_down", "confidence": 0.8}"#,
        )))
        .mount(&server)
        .await;

    let intent = resolver_for(&server)
        .resolve("move the page a bit", &BrowserContext::default())
        .await;

    assert_eq!(intent.action, ActionKind::Scroll);
    assert_eq!(intent.target, Some(Target::text("down")));
}

#[tokio::test]
async fn test_low_confidence_asks_to_rephrase() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            r#"{"success": true, "action": "click", "target": "something", "confidence": 0.3}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let intent = resolver_for(&server)
        .resolve("do the thing", &BrowserContext::default())
        .await;

    assert!(intent.is_unknown());
    assert!(intent.explanation.contains("30%"), "{}", intent.explanation);
}

#[tokio::test]
async fn test_request_body_carries_prompt_and_generation_config() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "generationConfig": { "topK": 1, "maxOutputTokens": 2048 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            r#"{"success": true, "action": "refresh", "confidence": 0.95}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let intent = resolver_for(&server)
        .resolve("reload everything", &BrowserContext::default())
        .await;
    assert_eq!(intent.action, ActionKind::Refresh);
}

// ────────────────────────────────────────────────────────────────────────────
// Client behaviour
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_no_api_key_skips_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = GeminiClient::new(None).with_base_url(server.uri());
    let resolver = IntentResolver::new(Arc::new(client));
    assert!(!resolver.is_configured());

    let intent = resolver
        .resolve("scroll down", &BrowserContext::default())
        .await;
    assert_eq!(intent.action, ActionKind::Scroll);
    assert_eq!(intent.source, IntentSource::ManualFallback);
}

#[tokio::test]
async fn test_client_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply("{}"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = GeminiClient::new(Some(KEY.to_string()))
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(50));
    let result = client
        .generate(&ModelEndpoint::new("v1beta", "gemini-1.5-flash"), "hi")
        .await;
    match result {
        Err(ModelError::Timeout(_)) => {}
        other => panic!("Expected Timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_empty_candidates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let client = GeminiClient::new(Some(KEY.to_string())).with_base_url(server.uri());
    let result = client
        .generate(&ModelEndpoint::new("v1", "gemini-pro"), "hi")
        .await;
    assert!(matches!(result, Err(ModelError::EmptyResponse)));
}

#[tokio::test]
async fn test_set_api_key_at_runtime() {
    let client = GeminiClient::new(None);
    assert!(!client.is_configured());
    client.set_api_key(Some(KEY.to_string()));
    assert!(client.is_configured());
    client.set_api_key(None);
    assert!(!client.is_configured());
}

// ────────────────────────────────────────────────────────────────────────────
// Interpreter modes
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hybrid_prefers_grammar() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            r#"{"success": true, "action": "find", "target": "pricing", "confidence": 0.9}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let interpreter = Interpreter::new(
        InterpreterMode::Hybrid,
        CommandGrammar::builtin().clone(),
        resolver_for(&server),
    );
    let ctx = BrowserContext::default();

    let grammar = interpreter.interpret("open new tab", &ctx).await;
    assert_eq!(grammar.action, ActionKind::NewTab);
    assert_eq!(grammar.source, IntentSource::Grammar);

    let model = interpreter
        .interpret("where does this page talk about pricing", &ctx)
        .await;
    assert_eq!(model.action, ActionKind::Find);
    assert_eq!(model.source, IntentSource::Llm);
}

#[tokio::test]
async fn test_grammar_mode_never_calls_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let interpreter = Interpreter::new(
        InterpreterMode::Grammar,
        CommandGrammar::builtin().clone(),
        resolver_for(&server),
    );
    let intent = interpreter
        .interpret("where does this page talk about pricing", &BrowserContext::default())
        .await;
    assert!(intent.is_unknown());
}
