//! Ragwise ingestion
//!
//! Loads raw text and web pages, splits them into chunks and indexes the
//! chunks into the shared [`ragwise_search::DocumentStore`].

pub mod chunker;
pub mod errors;
pub mod loader;
pub mod processor;

pub use chunker::{chunk_text, ChunkingConfig, TextChunk};
pub use errors::IngestionError;
pub use loader::{LoadedPage, PageLoader};
pub use processor::{FailedSource, IngestionReport, Ingestor, SourceText};
