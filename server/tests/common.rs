//! Common utilities for integration tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use server::config::ServerConfig;
use server::{build_app, router, AppState};

/// Create a test app instance with a small canvas and session limit.
pub fn create_test_app() -> Router {
    let config = ServerConfig {
        canvas_height: 64,
        max_sessions: 4,
        max_document_bytes: 64 * 1024,
        ..ServerConfig::default()
    };
    router(AppState::new(config))
}

/// The full middleware stack, rate limited to `per_minute` requests.
pub fn create_rate_limited_app(per_minute: u32) -> Router {
    let config = ServerConfig {
        rate_limit_per_minute: per_minute,
        ..ServerConfig::default()
    };
    build_app(AppState::new(config)).unwrap()
}

/// A 4-band, `cols`-step document with a flat "final" and one candidate.
pub fn sample_document(cols: usize) -> Value {
    let mel: Vec<Vec<f64>> = (0..4).map(|band| (0..cols).map(|t| (band + t) as f64).collect()).collect();
    json!({
        "mel": mel,
        "pitches": {
            "final": vec![1.0; cols],
            "crepe": vec![2.0; cols],
        }
    })
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

pub async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body.map(|b| b.to_string())).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Create a session and return its id.
pub async fn create_session(app: &Router) -> String {
    let (status, body) = send_json(app, "POST", "/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}
