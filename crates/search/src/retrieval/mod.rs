//! Document store abstraction
//!
//! The store is shared by every turn; implementations must serve concurrent
//! read-only queries. Indexing happens outside of query turns.

mod vector;

pub use vector::InMemoryVectorStore;

use async_trait::async_trait;
use ragwise_common::{Document, Result};

/// Pre-indexed documents answering similarity queries
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `k` documents most similar to `query`, best first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>>;

    /// Add documents to the index, returning how many were stored
    async fn index(&self, documents: Vec<Document>) -> Result<usize>;

    /// Number of indexed documents
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
