//! Webhook HTTP surface.
//!
//! GitHub posts deliveries either as raw JSON or, for form-encoded hooks,
//! as `payload=<urlencoded json>`. The receiver acknowledges every
//! delivery with 200 regardless of dispatch outcome so the sender never
//! retries events we have already seen.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, warn};

use quill_orchestrator::EventDispatcher;

pub fn build_router(dispatcher: Arc<EventDispatcher>, webhook_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(webhook_path, post(receive_webhook))
        .with_state(dispatcher)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "quill" }))
}

async fn receive_webhook(
    State(dispatcher): State<Arc<EventDispatcher>>,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    let event = headers
        .get("x-github-event")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if event.is_empty() {
        warn!("delivery without x-github-event header");
        return Json(json!({ "received": true }));
    }
    match parse_webhook_body(&body) {
        Some(payload) => {
            debug!(event = %event, "dispatching webhook delivery");
            dispatcher.dispatch(&event, &payload).await;
        }
        None => warn!(event = %event, "undecodable webhook body"),
    }
    Json(json!({ "received": true }))
}

/// Accepts both delivery content types: raw JSON bodies and
/// `application/x-www-form-urlencoded` bodies carrying a `payload` field.
pub(crate) fn parse_webhook_body(body: &str) -> Option<Value> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).ok();
    }
    for pair in body.split('&') {
        if let Some(encoded) = pair.strip_prefix("payload=") {
            let decoded = percent_decode(encoded);
            return serde_json::from_str(&decoded).ok();
        }
    }
    None
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes.get(i + 1..i + 3);
                match hex.and_then(|hex| {
                    std::str::from_utf8(hex)
                        .ok()
                        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                }) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
