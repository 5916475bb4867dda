//! Bounded exponential retry around a web search provider

use super::WebSearchProvider;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use ragwise_common::config::WebSearchConfig;
use ragwise_common::{metrics, Document, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Retry limits for transient web search failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl From<&WebSearchConfig> for RetryPolicy {
    fn from(config: &WebSearchConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_interval: Duration::from_millis(config.initial_backoff_ms),
            max_interval: Duration::from_secs(config.max_backoff_secs),
        }
    }
}

/// Wraps a provider, retrying `UpstreamUnavailable` and `Timeout` failures
pub struct RetryingWebSearch {
    inner: Arc<dyn WebSearchProvider>,
    policy: RetryPolicy,
}

impl RetryingWebSearch {
    pub fn new(inner: Arc<dyn WebSearchProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl WebSearchProvider for RetryingWebSearch {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.policy.initial_interval)
            .with_max_interval(self.policy.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let inner = &self.inner;
        let max_attempts = self.policy.max_attempts;
        let attempts_ref = &attempts;

        let operation = move || async move {
            let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
            match inner.search(query).await {
                Ok(documents) => Ok(documents),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        };

        let provider = self.inner.name();
        let notify = |e: ragwise_common::AppError, wait: Duration| {
            metrics::record_web_search_retry(provider);
            warn!(
                provider,
                attempt = attempts.load(Ordering::SeqCst),
                max_attempts,
                wait_ms = wait.as_millis() as u64,
                error = %e,
                "Web search failed, retrying"
            );
        };

        backoff::future::retry_notify(backoff, operation, notify).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
