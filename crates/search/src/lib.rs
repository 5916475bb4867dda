//! Ragwise search collaborators
//!
//! Provides the two evidence sources the agent can route to:
//! - Document store (in-memory vector similarity search)
//! - Web search (Tavily, wrapped with bounded exponential-backoff retries)

pub mod retrieval;
pub mod web;

pub use retrieval::{DocumentStore, InMemoryVectorStore};
pub use web::{create_web_search, RetryPolicy, RetryingWebSearch, WebSearchProvider};
