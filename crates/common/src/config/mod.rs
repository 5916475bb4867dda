//! Configuration management for Ragwise
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Web search provider configuration
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Orchestrator behaviour
    #[serde(default)]
    pub agent: AgentConfig,

    /// Document ingestion
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Completion provider: openai (any OpenAI-compatible endpoint)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Re-asks after a structured response fails schema validation
    #[serde(default = "default_schema_retries")]
    pub schema_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Documents returned per retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSearchConfig {
    /// Search provider: tavily
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// API key for the search provider
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_search_api_base")]
    pub api_base: String,

    /// Results requested per query
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Total attempts for transient failures
    #[serde(default = "default_search_retries")]
    pub max_retries: u32,

    /// First backoff interval in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff interval in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

/// What the relevance step does with documents graded irrelevant
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelevancePolicy {
    /// Drop irrelevant documents; escalate when too few remain
    FilterAndFlag,
    /// Keep every document; escalate when any is irrelevant
    FlagOnly,
}

/// Answer returned when the generation budget runs out
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetFallback {
    /// Fixed "could not produce a grounded answer" text
    Sentinel,
    /// The last generation, even though it failed grading
    BestEffort,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Topics held in the vectorstore, shown to the router
    #[serde(default = "default_vectorstore_topics")]
    pub vectorstore_topics: String,

    /// Relevance grading policy
    #[serde(default = "default_relevance_policy")]
    pub relevance_policy: RelevancePolicy,

    /// Minimum relevant documents before escalating (filter_and_flag only)
    #[serde(default = "default_min_relevant")]
    pub min_relevant_documents: usize,

    /// Documents graded concurrently
    #[serde(default = "default_grading_concurrency")]
    pub grading_concurrency: usize,

    /// Cap on GENERATE invocations per turn
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: u32,

    /// Fallback answer once the cap is hit
    #[serde(default = "default_budget_fallback")]
    pub budget_fallback: BudgetFallback,

    /// Timeout for a single external call in seconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Timeout for a whole turn in seconds
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,

    /// Buffered events per streaming turn
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks shorter than this are discarded
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// URLs indexed at startup
    #[serde(default)]
    pub seed_urls: Vec<String>,

    /// Page fetch timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_concurrent() -> usize { 64 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { crate::DEFAULT_COMPLETION_MODEL.to_string() }
fn default_temperature() -> f32 { 0.0 }
fn default_max_tokens() -> usize { 1024 }
fn default_llm_timeout() -> u64 { 30 }
fn default_schema_retries() -> u32 { 2 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 64 }
fn default_top_k() -> usize { 4 }
fn default_search_provider() -> String { "tavily".to_string() }
fn default_search_api_base() -> String { "https://api.tavily.com".to_string() }
fn default_search_max_results() -> usize { 3 }
fn default_search_timeout() -> u64 { 15 }
fn default_search_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 250 }
fn default_max_backoff() -> u64 { 5 }
fn default_vectorstore_topics() -> String { "the documents indexed into the local store".to_string() }
fn default_relevance_policy() -> RelevancePolicy { RelevancePolicy::FilterAndFlag }
fn default_min_relevant() -> usize { 1 }
fn default_grading_concurrency() -> usize { 4 }
fn default_max_generation_attempts() -> u32 { 3 }
fn default_budget_fallback() -> BudgetFallback { BudgetFallback::Sentinel }
fn default_operation_timeout() -> u64 { 60 }
fn default_turn_timeout() -> u64 { 180 }
fn default_stream_buffer() -> usize { 64 }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 0 }
fn default_min_chunk_size() -> usize { 50 }
fn default_fetch_timeout() -> u64 { 20 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "ragwise".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__AGENT__MAX_GENERATION_ATTEMPTS=5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        let checks: [(bool, &str); 7] = [
            (self.store.top_k > 0, "store.top_k must be at least 1"),
            (
                self.agent.max_generation_attempts > 0,
                "agent.max_generation_attempts must be at least 1",
            ),
            (
                self.agent.grading_concurrency > 0,
                "agent.grading_concurrency must be at least 1",
            ),
            (self.agent.stream_buffer > 0, "agent.stream_buffer must be at least 1"),
            (self.web_search.max_retries > 0, "web_search.max_retries must be at least 1"),
            (self.ingestion.chunk_size > 0, "ingestion.chunk_size must be at least 1"),
            (
                !self.rate_limit.enabled
                    || (self.rate_limit.requests_per_second > 0 && self.rate_limit.burst > 0),
                "rate_limit.requests_per_second and rate_limit.burst must be positive",
            ),
        ];

        for (ok, message) in checks {
            if !ok {
                return Err(AppError::Configuration {
                    message: message.to_string(),
                });
            }
        }

        if self.agent.operation_timeout_secs > self.agent.turn_timeout_secs {
            return Err(AppError::Configuration {
                message: "agent.operation_timeout_secs exceeds agent.turn_timeout_secs".to_string(),
            });
        }

        Ok(())
    }
}

impl AgentConfig {
    /// Get the per-call timeout as Duration
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Get the turn timeout as Duration
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: default_llm_api_base(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
            schema_retries: default_schema_retries(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            api_base: default_search_api_base(),
            max_results: default_search_max_results(),
            timeout_secs: default_search_timeout(),
            max_retries: default_search_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vectorstore_topics: default_vectorstore_topics(),
            relevance_policy: default_relevance_policy(),
            min_relevant_documents: default_min_relevant(),
            grading_concurrency: default_grading_concurrency(),
            max_generation_attempts: default_max_generation_attempts(),
            budget_fallback: default_budget_fallback(),
            operation_timeout_secs: default_operation_timeout(),
            turn_timeout_secs: default_turn_timeout(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
            seed_urls: Vec::new(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.top_k, 4);
        assert_eq!(config.agent.max_generation_attempts, 3);
        assert_eq!(config.agent.relevance_policy, RelevancePolicy::FilterAndFlag);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_generation_cap_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_generation_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_operation_timeout_must_fit_turn() {
        let mut config = AppConfig::default();
        config.agent.operation_timeout_secs = 300;
        config.agent.turn_timeout_secs = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_deserialization() {
        let agent: AgentConfig = serde_json::from_str(
            r#"{"relevance_policy": "flag_only", "budget_fallback": "best_effort"}"#,
        )
        .unwrap();
        assert_eq!(agent.relevance_policy, RelevancePolicy::FlagOnly);
        assert_eq!(agent.budget_fallback, BudgetFallback::BestEffort);
        assert_eq!(agent.turn_timeout(), Duration::from_secs(180));
    }
}
