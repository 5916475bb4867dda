//! Tavily search API client

use super::WebSearchProvider;
use async_trait::async_trait;
use ragwise_common::config::WebSearchConfig;
use ragwise_common::{AppError, Document, DocumentOrigin, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "tavily";

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Tavily web search client
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: usize,
    timeout_ms: u64,
}

impl TavilySearch {
    /// Create a new client; an API key is required
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "web_search.api_key is required for the tavily provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            timeout_ms: config.timeout_secs * 1000,
        })
    }

    /// Map a non-success status to a transient or permanent error
    fn status_error(status: StatusCode, body: String) -> AppError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Configuration {
                message: format!("Tavily rejected the API key ({})", status),
            },
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                AppError::upstream(SERVICE, format!("API error {}: {}", status, body))
            }
            _ => AppError::Internal {
                message: format!("Tavily request rejected {}: {}", status, body),
            },
        }
    }

    fn into_documents(response: SearchResponse) -> Vec<Document> {
        response
            .results
            .into_iter()
            .filter(|hit| !hit.content.trim().is_empty())
            .map(|hit| {
                let mut doc = Document::new(hit.content, DocumentOrigin::WebSearch).with_source(hit.url);
                if let Some(title) = hit.title {
                    doc = doc.with_title(title);
                }
                if let Some(score) = hit.score {
                    doc = doc.with_score(score);
                }
                doc
            })
            .collect()
    }
}

#[async_trait]
impl WebSearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let request = SearchRequest {
            query,
            max_results: self.max_results,
            search_depth: "basic",
        };

        let response = self.client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout {
                        operation: SERVICE.to_string(),
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    AppError::upstream(SERVICE, format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("Failed to parse response: {}", e)))?;

        let documents = Self::into_documents(parsed);
        tracing::debug!(query, results = documents.len(), "Tavily search");
        Ok(documents)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_mapping() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"results": [
                {"title": "Butter chicken", "url": "https://food.example/curry", "content": "Marinate the chicken.", "score": 0.92},
                {"url": "https://empty.example", "content": "   "}
            ]}"#,
        )
        .unwrap();

        let docs = TavilySearch::into_documents(response);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.origin, DocumentOrigin::WebSearch);
        assert_eq!(docs[0].metadata.source.as_deref(), Some("https://food.example/curry"));
        assert_eq!(docs[0].metadata.title.as_deref(), Some("Butter chicken"));
        assert_eq!(docs[0].metadata.score, Some(0.92));
    }

    #[test]
    fn test_status_classification() {
        assert!(TavilySearch::status_error(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(TavilySearch::status_error(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(!TavilySearch::status_error(StatusCode::UNAUTHORIZED, String::new()).is_transient());
        assert!(!TavilySearch::status_error(StatusCode::BAD_REQUEST, String::new()).is_transient());
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            TavilySearch::new(&WebSearchConfig::default()),
            Err(AppError::Configuration { .. })
        ));
    }
}
