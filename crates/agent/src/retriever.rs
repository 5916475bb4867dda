//! Retrieval from the local document store

use ragwise_common::{Document, Result};
use ragwise_search::DocumentStore;
use std::sync::Arc;
use tracing::debug;

/// Top-k similarity lookup over the shared store
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<Document>> {
        let documents = self.store.search(question, self.top_k).await?;
        debug!(top_k = self.top_k, returned = documents.len(), "Documents retrieved");
        Ok(documents)
    }
}
