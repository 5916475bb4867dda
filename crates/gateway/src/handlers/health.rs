//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: StoreCheck,
}

#[derive(Serialize)]
pub struct StoreCheck {
    /// `up`, or `empty` before anything has been indexed
    pub status: String,
    pub documents: usize,
    pub latency_ms: u64,
}

/// Liveness check, healthy whenever the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: ragwise_common::VERSION,
    })
}

/// Readiness check
///
/// An empty store still serves traffic: questions route to web search.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = Instant::now();
    let documents = state.store.len().await;

    Json(ReadyResponse {
        status: "ready".to_string(),
        checks: HealthChecks {
            store: StoreCheck {
                status: if documents == 0 { "empty" } else { "up" }.to_string(),
                documents,
                latency_ms: start.elapsed().as_millis() as u64,
            },
        },
    })
}
