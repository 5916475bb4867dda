//! Ingestion handlers

use axum::{extract::State, http::StatusCode, Json};
use ragwise_common::errors::{AppError, Result};
use ragwise_ingestion::{IngestionReport, SourceText};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct IngestDocumentsRequest {
    #[validate(length(min = 1, max = 100), nested)]
    pub documents: Vec<DocumentInput>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DocumentInput {
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IngestUrlsRequest {
    #[validate(length(min = 1, max = 20))]
    pub urls: Vec<String>,
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation {
        message: e.to_string(),
        field: None,
    }
}

/// Chunk and index raw texts
pub async fn ingest_documents(
    State(state): State<AppState>,
    Json(request): Json<IngestDocumentsRequest>,
) -> Result<(StatusCode, Json<IngestionReport>)> {
    request.validate().map_err(validation_error)?;

    let texts = request
        .documents
        .into_iter()
        .map(|d| SourceText {
            content: d.content,
            title: d.title,
            source: d.source,
        })
        .collect();

    let report = state.ingestor.ingest_texts(texts).await?;
    info!(chunks = report.chunks_indexed, "Documents ingested");
    Ok((StatusCode::CREATED, Json(report)))
}

/// Fetch, chunk and index web pages
///
/// Pages that fail to load are listed in the report; malformed URLs reject
/// the whole request.
pub async fn ingest_urls(
    State(state): State<AppState>,
    Json(request): Json<IngestUrlsRequest>,
) -> Result<(StatusCode, Json<IngestionReport>)> {
    request.validate().map_err(validation_error)?;

    let report = state.ingestor.ingest_urls(&request.urls).await?;
    info!(
        sources = report.sources,
        chunks = report.chunks_indexed,
        failed = report.failed.len(),
        "URLs ingested"
    );
    Ok((StatusCode::CREATED, Json(report)))
}
