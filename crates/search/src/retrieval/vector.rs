//! In-memory vector similarity search
//!
//! Documents are embedded once at index time; queries are embedded and
//! ranked by cosine similarity against every entry.

use super::DocumentStore;
use async_trait::async_trait;
use ragwise_common::{embeddings::Embedder, metrics, AppError, Document, DocumentOrigin, Result};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

struct IndexedDocument {
    document: Document,
    embedding: Vec<f32>,
}

/// Vector store held in process memory
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryVectorStore {
    /// Create an empty store
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }
}

/// Cosine similarity of two vectors (0.0 when either is all zeros)
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl DocumentStore for InMemoryVectorStore {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let query_embedding = self.embedder.embed(query).await?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &IndexedDocument)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&query_embedding, &entry.embedding), entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let documents: Vec<Document> = scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| entry.document.clone().with_score(score))
            .collect();

        metrics::record_store_query(start.elapsed().as_secs_f64(), entries.len());
        debug!(k, returned = documents.len(), "Vector store query");

        Ok(documents)
    }

    async fn index(&self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        // Embed before taking the write lock so readers are not blocked on the model
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != documents.len() {
            return Err(AppError::Internal {
                message: format!(
                    "Embedder returned {} vectors for {} documents",
                    embeddings.len(),
                    documents.len()
                ),
            });
        }

        let count = documents.len();
        let mut entries = self.entries.write().await;
        entries.extend(documents.into_iter().zip(embeddings).map(|(mut document, embedding)| {
            document.metadata.origin = DocumentOrigin::Vectorstore;
            document.metadata.score = None;
            IndexedDocument { document, embedding }
        }));

        debug!(indexed = count, total = entries.len(), "Documents indexed");
        Ok(count)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
