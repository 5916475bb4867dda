//! Orchestrator graph export

use axum::http::header;
use axum::response::IntoResponse;
use ragwise_agent::graph;

/// Mermaid flowchart of the answering state machine
pub async fn graph() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], graph::to_mermaid())
}
