//! Ragwise Common Library
//!
//! Shared code for all Ragwise crates including:
//! - Document model shared by the store, web search and the agent
//! - Completion service abstraction (free-text, structured, streaming)
//! - Embedding client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and tracing setup

pub mod config;
pub mod documents;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use documents::{Document, DocumentMetadata, DocumentOrigin};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::CompletionService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default completion model
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
