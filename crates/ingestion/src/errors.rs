//! Ingestion error types

use ragwise_common::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No text content in {0}")]
    EmptyContent(String),

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Markup error: {0}")]
    Markup(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Fetch { url, message } => {
                AppError::upstream(url, message)
            }
            IngestionError::InvalidUrl(url) => AppError::Validation {
                message: format!("Invalid URL: {}", url),
                field: Some("urls".to_string()),
            },
            IngestionError::EmptyContent(source) => AppError::Validation {
                message: format!("No text content in {}", source),
                field: None,
            },
            IngestionError::Chunking(message)
            | IngestionError::Client(message)
            | IngestionError::Markup(message) => {
                AppError::Internal { message }
            }
            IngestionError::Store(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_app_error() {
        let err: AppError = IngestionError::Fetch {
            url: "https://example.com".to_string(),
            message: "connection refused".to_string(),
        }
        .into();
        assert!(err.is_transient());

        let err: AppError = IngestionError::InvalidUrl("ftp://x".to_string()).into();
        assert!(err.is_client_error());

        let inner = AppError::Internal { message: "embedder down".to_string() };
        let err: AppError = IngestionError::Store(inner).into();
        assert!(matches!(err, AppError::Internal { .. }));
    }
}
