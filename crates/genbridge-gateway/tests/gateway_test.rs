//! Exercises `GeminiGateway` against a local mock of the REST endpoint.

use axum::{body::Bytes, http::StatusCode, http::Uri, Json, Router};
use genbridge_gateway::{
    summary_or_fallback, AiGateway, Coordinates, GatewayConfig, GatewayError, GeminiGateway,
    FALLBACK_IMPACT_SUMMARY,
};
use genbridge_types::{Task, TaskCategory, TaskStatus};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// A captured request: path and decoded JSON body.
type Captured = Arc<Mutex<Vec<(String, Value)>>>;

/// Starts a mock server that records each request and answers with
/// `status` and `reply`.
async fn spawn_mock(status: StatusCode, reply: Value) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let app = Router::new().fallback(move |uri: Uri, body: Bytes| {
        let sink = sink.clone();
        let reply = reply.clone();
        async move {
            let parsed: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            sink.lock().unwrap().push((uri.path().to_string(), parsed));
            (status, Json(reply))
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v1beta", addr), captured)
}

fn text_reply(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

fn gateway(base_url: &str) -> GeminiGateway {
    GeminiGateway::new(GatewayConfig::new("test-key").with_base_url(base_url)).unwrap()
}

fn sample_task(category: TaskCategory, status: TaskStatus) -> Task {
    Task {
        id: "task-1".to_string(),
        title: "t".to_string(),
        description: "d".to_string(),
        category,
        requester_id: "e1".to_string(),
        helper_id: None,
        status,
        credit_value: 10,
        location: "Oak Avenue".to_string(),
        created_at: 0,
    }
}

#[tokio::test]
async fn classify_sends_schema_and_parses_category() {
    let reply = text_reply(
        r#"{"title":"Leaking Sink","category":"Light Admin","refinedDescription":"Arrange a plumber visit.","suggestedCredits":40}"#,
    );
    let (base, captured) = spawn_mock(StatusCode::OK, reply).await;

    let analysis = gateway(&base)
        .classify_task("my sink is leaking")
        .await
        .expect("classification should succeed");

    assert_eq!(analysis.category, TaskCategory::Admin);
    assert!(TaskCategory::ALL.contains(&analysis.category));
    assert_eq!(analysis.suggested_credits, 40);

    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (path, body) = &requests[0];
    assert_eq!(path, "/v1beta/models/gemini-3-flash-preview:generateContent");
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("my sink is leaking"));
}

#[tokio::test]
async fn classify_with_unknown_category_is_invalid() {
    let reply = text_reply(
        r#"{"title":"Leaking Sink","category":"Plumbing","refinedDescription":"x","suggestedCredits":40}"#,
    );
    let (base, _) = spawn_mock(StatusCode::OK, reply).await;

    let result = gateway(&base).classify_task("my sink is leaking").await;
    assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
}

#[tokio::test]
async fn http_errors_are_reported_with_status() {
    let (base, _) = spawn_mock(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "message": "overloaded" } }),
    )
    .await;

    match gateway(&base).classify_task("anything").await {
        Err(GatewayError::Http { status, body }) => {
            assert_eq!(status, 503);
            assert!(body.contains("overloaded"));
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_api_key_fails_without_a_request() {
    let (base, captured) = spawn_mock(StatusCode::OK, text_reply("{}")).await;
    let gateway = GeminiGateway::new(GatewayConfig::default().with_base_url(base)).unwrap();

    let result = gateway.classify_task("anything").await;
    assert!(matches!(result, Err(GatewayError::NotConfigured)));
    assert!(captured.lock().unwrap().is_empty());
}

#[tokio::test]
async fn location_context_sends_coordinates_and_collects_map_links() {
    let reply = json!({
        "candidates": [{
            "content": { "parts": [{ "text": "A shaded community garden." }] },
            "groundingMetadata": { "groundingChunks": [
                { "maps": { "uri": "https://maps.example/1", "title": "Oak Avenue Garden" } },
                { "web": { "uri": "https://example.org", "title": "Blog" } }
            ]}
        }]
    });
    let (base, captured) = spawn_mock(StatusCode::OK, reply).await;

    let context = gateway(&base)
        .location_context(
            "Oak Avenue",
            Some(Coordinates {
                latitude: 41.0,
                longitude: 29.0,
            }),
        )
        .await
        .unwrap();

    assert_eq!(context.text, "A shaded community garden.");
    assert_eq!(context.links.len(), 1);
    assert_eq!(context.links[0].title, "Oak Avenue Garden");

    let requests = captured.lock().unwrap();
    let (path, body) = &requests[0];
    assert_eq!(path, "/v1beta/models/gemini-2.5-flash:generateContent");
    assert_eq!(body["toolConfig"]["retrievalConfig"]["latLng"]["latitude"], 41.0);
    assert_eq!(body["tools"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn location_context_without_coordinates_omits_tool_config() {
    let (base, captured) = spawn_mock(StatusCode::OK, text_reply("Busy street.")).await;

    let context = gateway(&base).location_context("Main St", None).await.unwrap();
    assert!(context.links.is_empty());
    assert!(captured.lock().unwrap()[0].1.get("toolConfig").is_none());
}

#[tokio::test]
async fn impact_summary_uses_task_digest() {
    let (base, captured) = spawn_mock(StatusCode::OK, text_reply("  Neighbors helped neighbors.  ")).await;
    let tasks = vec![sample_task(TaskCategory::Garden, TaskStatus::Verified)];

    let summary = gateway(&base).impact_summary(&tasks).await.unwrap();
    assert_eq!(summary, "Neighbors helped neighbors.");

    let requests = captured.lock().unwrap();
    let body = &requests[0].1;
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 100);
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Garden Help: VERIFIED"));
}

#[tokio::test]
async fn summary_falls_back_when_gateway_fails() {
    let (base, _) = spawn_mock(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;
    let summary = summary_or_fallback(&gateway(&base), &[]).await;
    assert_eq!(summary, FALLBACK_IMPACT_SUMMARY);

    let (base, _) = spawn_mock(StatusCode::OK, text_reply("   ")).await;
    let summary = summary_or_fallback(&gateway(&base), &[]).await;
    assert_eq!(summary, FALLBACK_IMPACT_SUMMARY);
}
