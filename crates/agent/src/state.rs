//! Per-turn state

use crate::graph::Node;
use ragwise_common::{AppError, Document, Result};
use serde::Serialize;
use std::fmt;

/// A validated, immutable user question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Reject empty or whitespace-only input
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AppError::Validation {
                message: "question must not be empty".to_string(),
                field: Some("question".to_string()),
            });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The record threaded through every step of a single turn
///
/// `documents` is `None` until RETRIEVE or WEBSEARCH runs; an empty list
/// means a step ran and found nothing.
#[derive(Debug, Clone)]
pub struct SessionState {
    question: Question,
    pub documents: Option<Vec<Document>>,
    pub generation: Option<String>,
    pub needs_web_search: bool,
    pub generate_attempts: u32,
    pub path: Vec<Node>,
}

impl SessionState {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            documents: None,
            generation: None,
            needs_web_search: false,
            generate_attempts: 0,
            path: Vec::new(),
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Whether `node` appears in the visited path
    pub fn visited(&self, node: Node) -> bool {
        self.path.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_rejects_blank_input() {
        assert!(matches!(Question::new(""), Err(AppError::Validation { .. })));
        assert!(matches!(Question::new("  \n\t"), Err(AppError::Validation { .. })));
        assert_eq!(Question::new("What is an agent?").unwrap().as_str(), "What is an agent?");
    }

    #[test]
    fn test_new_state_is_undefined() {
        let state = SessionState::new(Question::new("q").unwrap());
        assert!(state.documents.is_none());
        assert!(state.generation.is_none());
        assert!(!state.needs_web_search);
        assert_eq!(state.generate_attempts, 0);
        assert!(state.path.is_empty());
        assert!(!state.visited(Node::Route));
    }
}
