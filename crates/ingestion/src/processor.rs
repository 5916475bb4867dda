//! Ingestion processor
//!
//! Turns raw texts and web pages into chunked documents and indexes them
//! into the shared document store. Chunks already indexed are skipped.

use crate::chunker::{chunk_text, ChunkingConfig};
use crate::errors::IngestionError;
use crate::loader::{parse_url, LoadedPage, PageLoader};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use ragwise_common::config::IngestionConfig;
use ragwise_common::{metrics, Document, DocumentOrigin};
use ragwise_search::DocumentStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Pages fetched concurrently during URL ingestion
const FETCH_CONCURRENCY: usize = 4;

/// A raw text submitted for indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceText {
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A source that could not be ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSource {
    pub source: String,
    pub error: String,
}

/// Outcome of an ingestion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub sources: usize,
    pub chunks_indexed: usize,
    pub duplicates_skipped: usize,
    pub failed: Vec<FailedSource>,
    pub completed_at: DateTime<Utc>,
}

/// Chunks and indexes sources into a document store
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    loader: PageLoader,
    chunking: ChunkingConfig,
    seen: Mutex<HashSet<String>>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn DocumentStore>, config: &IngestionConfig) -> Result<Self, IngestionError> {
        Ok(Self {
            store,
            loader: PageLoader::new(config.fetch_timeout_secs)?,
            chunking: ChunkingConfig::from(config),
            seen: Mutex::new(HashSet::new()),
        })
    }

    /// Index raw texts
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn ingest_texts(&self, texts: Vec<SourceText>) -> Result<IngestionReport, IngestionError> {
        let start = Instant::now();
        let sources = texts.len();
        let mut documents = Vec::new();
        let mut failed = Vec::new();

        for (i, text) in texts.into_iter().enumerate() {
            let label = text.source.clone().unwrap_or_else(|| format!("text[{}]", i));
            if text.content.trim().is_empty() {
                failed.push(FailedSource {
                    source: label.clone(),
                    error: IngestionError::EmptyContent(label).to_string(),
                });
                continue;
            }
            documents.extend(self.to_documents(&text.content, text.title, text.source)?);
        }

        let report = self.index(documents, sources, failed).await?;
        metrics::record_ingestion(start.elapsed().as_secs_f64(), report.chunks_indexed, "text");
        Ok(report)
    }

    /// Fetch pages and index their text; unreachable pages are reported, not fatal
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn ingest_urls(&self, urls: &[String]) -> Result<IngestionReport, IngestionError> {
        for url in urls {
            parse_url(url)?;
        }

        let start = Instant::now();
        // Boxed before buffering so the whole future stays Send
        let fetches: Vec<BoxFuture<'_, (String, Result<LoadedPage, IngestionError>)>> = urls
            .iter()
            .map(|url| async move { (url.clone(), self.loader.load(url).await) }.boxed())
            .collect();
        let pages: Vec<_> = stream::iter(fetches).buffered(FETCH_CONCURRENCY).collect().await;

        let mut documents = Vec::new();
        let mut failed = Vec::new();
        for (url, page) in pages {
            match page {
                Ok(page) => {
                    documents.extend(self.to_documents(&page.text, page.title, Some(page.url))?);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to load page");
                    failed.push(FailedSource {
                        source: url,
                        error: e.to_string(),
                    });
                }
            }
        }

        let report = self.index(documents, urls.len(), failed).await?;
        metrics::record_ingestion(start.elapsed().as_secs_f64(), report.chunks_indexed, "url");
        Ok(report)
    }

    fn to_documents(
        &self,
        text: &str,
        title: Option<String>,
        source: Option<String>,
    ) -> Result<Vec<Document>, IngestionError> {
        let chunks = chunk_text(text, &self.chunking)?;
        Ok(chunks
            .into_iter()
            .map(|chunk| {
                let mut doc = Document::new(chunk.content, DocumentOrigin::Vectorstore);
                if let Some(title) = &title {
                    doc = doc.with_title(title.clone());
                }
                if let Some(source) = &source {
                    doc = doc.with_source(source.clone());
                }
                doc
            })
            .collect())
    }

    async fn index(
        &self,
        documents: Vec<Document>,
        sources: usize,
        failed: Vec<FailedSource>,
    ) -> Result<IngestionReport, IngestionError> {
        let total = documents.len();
        let fresh = self.take_unseen(documents);
        let duplicates_skipped = total - fresh.len();

        let hashes: Vec<String> = fresh.iter().map(|d| content_hash(&d.content)).collect();
        let chunks_indexed = match self.store.index(fresh).await {
            Ok(count) => count,
            Err(e) => {
                // Allow a later attempt to index the same chunks
                self.forget(&hashes);
                return Err(e.into());
            }
        };

        info!(
            sources,
            chunks_indexed,
            duplicates_skipped,
            failed = failed.len(),
            "Ingestion complete"
        );

        Ok(IngestionReport {
            sources,
            chunks_indexed,
            duplicates_skipped,
            failed,
            completed_at: Utc::now(),
        })
    }

    /// Keep documents whose content has not been indexed before, marking them seen
    fn take_unseen(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        documents
            .into_iter()
            .filter(|doc| seen.insert(content_hash(&doc.content)))
            .collect()
    }

    fn forget(&self, hashes: &[String]) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        for hash in hashes {
            seen.remove(hash);
        }
    }
}

fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.trim().as_bytes()))
}
