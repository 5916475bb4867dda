//! Document model shared by the store, web search and the agent

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a document came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    /// Local document store
    Vectorstore,
    /// Live web search
    WebSearch,
}

/// Source metadata attached to a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    /// Origin URL, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Page or document title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub origin: DocumentOrigin,

    /// Similarity or provider score (higher is better)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A retrieved unit of text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document with no source metadata
    pub fn new(content: impl Into<String>, origin: DocumentOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            metadata: DocumentMetadata {
                source: None,
                title: None,
                origin,
                score: None,
            },
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.metadata.score = Some(score);
        self
    }

    /// Short label used when rendering documents into prompts
    pub fn label(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .or(self.metadata.source.as_deref())
            .unwrap_or("untitled")
    }
}

/// Render documents as a numbered context block for prompts
pub fn format_context(documents: &[Document]) -> String {
    let mut context = String::new();
    for (i, doc) in documents.iter().enumerate() {
        context.push_str(&format!("[{}] {}\n{}\n\n", i + 1, doc.label(), doc.content.trim()));
    }
    context.trim_end().to_string()
}
