//! Web search providers
//!
//! Providers return documents tagged with `DocumentOrigin::WebSearch`.
//! Production providers are wrapped in [`RetryingWebSearch`] so network
//! failures are retried a bounded number of times before failing the turn.

mod retry;
mod tavily;

pub use retry::{RetryPolicy, RetryingWebSearch};
pub use tavily::TavilySearch;

use async_trait::async_trait;
use ragwise_common::config::WebSearchConfig;
use ragwise_common::{AppError, Document, Result};
use std::sync::Arc;

/// Keyword/semantic search over the live web
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Search the web, best results first
    async fn search(&self, query: &str) -> Result<Vec<Document>>;

    /// Provider name for logs and metrics
    fn name(&self) -> &str;
}

/// Create a retrying web search provider based on configuration
pub fn create_web_search(config: &WebSearchConfig) -> Result<Arc<dyn WebSearchProvider>> {
    let provider: Arc<dyn WebSearchProvider> = match config.provider.as_str() {
        "tavily" => Arc::new(TavilySearch::new(config)?),
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown web search provider: {}", other),
            })
        }
    };

    Ok(Arc::new(RetryingWebSearch::new(provider, RetryPolicy::from(config))))
}
