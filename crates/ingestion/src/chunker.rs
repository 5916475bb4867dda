//! Text chunking module
//!
//! Splits loaded text into semantic chunks for embedding.

use crate::errors::IngestionError;
use ragwise_common::config::IngestionConfig;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
    /// Chunks shorter than this are dropped
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

impl From<&IngestionConfig> for ChunkingConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            min_chunk_size: config.min_chunk_size,
        }
    }
}

/// A chunk of a source text
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    /// Position among the kept chunks of the source
    pub index: usize,
    /// Byte offset in the source text
    pub start_pos: usize,
}

/// Split text into chunks, dropping whitespace-only and undersized pieces
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, IngestionError> {
    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| IngestionError::Chunking(e.to_string()))?;
    let splitter = TextSplitter::new(chunk_config);

    let chunks: Vec<TextChunk> = splitter
        .chunk_indices(text)
        .filter(|(_, chunk)| chunk.trim().len() >= config.min_chunk_size.max(1))
        .enumerate()
        .map(|(index, (start_pos, chunk))| TextChunk {
            content: chunk.to_string(),
            index,
            start_pos,
        })
        .collect();

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        "Text chunked"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
            min_chunk_size,
        }
    }

    #[test]
    fn test_basic_chunking() {
        let text = "Agents plan before they act. ".repeat(100);
        let config = config(200, 0, 50);

        let chunks = chunk_text(&text, &config).unwrap();
        assert!(chunks.len() > 1);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.content.len() <= config.chunk_size);
            assert!(chunk.content.trim().len() >= config.min_chunk_size);
            assert_eq!(&text[chunk.start_pos..chunk.start_pos + chunk.content.len()], chunk.content);
        }
    }

    #[test]
    fn test_overlap_chunking() {
        let text = "Sentence one. Sentence two. Sentence three. Sentence four. Sentence five.";
        let chunks = chunk_text(text, &config(30, 10, 5)).unwrap();

        assert!(chunks.len() >= 2);
        // Overlapping windows start before the previous chunk ends
        assert!(chunks[1].start_pos < chunks[0].start_pos + chunks[0].content.len());
    }

    #[test]
    fn test_small_chunks_dropped() {
        let chunks = chunk_text("tiny", &config(100, 0, 50)).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkingConfig::default()).unwrap().is_empty());
        assert!(chunk_text("   \n\n ", &ChunkingConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_larger_than_chunk_rejected() {
        assert!(matches!(
            chunk_text("some text", &config(10, 20, 1)),
            Err(IngestionError::Chunking(_))
        ));
    }
}
