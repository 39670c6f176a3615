//! Contract tests for the reply endpoint client against a mock HTTP server.
//!
//! Pin down the request bodies the client produces for each payload shape
//! and the absorb-everything failure behaviour.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use solace::Mode;
use solace::config::{PayloadShape, ReplyConfig};
use solace::reply::ReplyClient;

fn client_for(server: &MockServer) -> ReplyClient {
    let config = ReplyConfig {
        endpoint: format!("{}/reply/", server.uri()),
        ..ReplyConfig::default()
    };
    ReplyClient::new(config)
}

#[tokio::test]
async fn success_returns_generated_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reply/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "That sounds hard. I'm here."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = client
        .get_reply("I feel anxious", "", Mode::Chat.prompt())
        .await;
    assert_eq!(reply, "That sounds hard. I'm here.");
}

#[tokio::test]
async fn merged_payload_sends_one_prompt_string() {
    let server = MockServer::start().await;
    let prompt = Mode::Chat.prompt();
    let expected = format!("{prompt}\n\nContext:\nUser: hi\nAI: hello\nUser: how are you\nAI:");
    Mock::given(method("POST"))
        .and(path("/reply/"))
        .and(body_json(json!({ "message": expected })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "Well." })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = client
        .get_reply("how are you", "User: hi\nAI: hello", prompt)
        .await;
    assert_eq!(reply, "Well.");
}

#[tokio::test]
async fn structured_payload_sends_separate_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reply/"))
        .and(body_json(json!({
            "message": "how are you",
            "context": "User: hi\nAI: hello"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "Well." })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ReplyConfig {
        endpoint: format!("{}/reply/", server.uri()),
        payload: PayloadShape::Structured,
        ..ReplyConfig::default()
    };
    let client = ReplyClient::new(config);
    let reply = client
        .get_reply("how are you", "User: hi\nAI: hello", Mode::Chat.prompt())
        .await;
    assert_eq!(reply, "Well.");
}

#[tokio::test]
async fn api_key_is_sent_as_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reply/"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ReplyConfig {
        endpoint: format!("{}/reply/", server.uri()),
        api_key: Some("sk-test".to_owned()),
        ..ReplyConfig::default()
    };
    let client = ReplyClient::new(config);
    assert_eq!(client.get_reply("hi", "", Mode::Chat.prompt()).await, "ok");
}

#[tokio::test]
async fn server_error_yields_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reply/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = client.get_reply("hello", "", Mode::Chat.prompt()).await;
    assert_eq!(
        reply,
        "I'm having trouble connecting to the server. Please try again later."
    );
}

#[tokio::test]
async fn malformed_body_yields_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reply/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = client.get_reply("hello", "", Mode::Chat.prompt()).await;
    assert_eq!(reply, client.fallback_text());
}

#[tokio::test]
async fn unreachable_endpoint_yields_fallback_text() {
    // A server that is started and immediately dropped leaves a port nothing
    // is listening on.
    let endpoint = {
        let server = MockServer::start().await;
        format!("{}/reply/", server.uri())
    };

    let config = ReplyConfig {
        endpoint,
        ..ReplyConfig::default()
    };
    let client = ReplyClient::new(config);
    let reply = client.get_reply("hello", "", Mode::Chat.prompt()).await;
    assert_eq!(reply, client.fallback_text());
}
