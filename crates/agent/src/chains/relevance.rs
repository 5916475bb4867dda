//! Document relevance grading

use ragwise_common::config::RelevancePolicy;
use ragwise_common::llm::{complete_typed, CompletionService, Prompt, StructuredOutput};
use ragwise_common::{metrics, Document, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM: &str = "You are a grader assessing relevance of a retrieved document to a user question.\n\
If the document contains keyword(s) or semantic meaning related to the question, grade it as relevant.\n\
Give a binary score 'yes' or 'no' score to indicate whether the document is relevant to the question.";

/// Relevance verdict for one document
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GradeDocuments {
    /// Documents are relevant to the question, true or false
    pub binary_score: bool,
}

impl StructuredOutput for GradeDocuments {
    const NAME: &'static str = "grade_documents";
    const DESCRIPTION: &'static str = "Documents are relevant to the question";
}

/// Judges whether a document bears on a question
pub struct RelevanceGrader {
    llm: Arc<dyn CompletionService>,
}

impl RelevanceGrader {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    pub async fn grade(&self, question: &str, document: &Document) -> Result<bool> {
        let prompt = Prompt::new(
            SYSTEM,
            format!("Retrieved document: \n\n {} \n\n User question: {}", document.content, question),
        );
        let grade: GradeDocuments = complete_typed(self.llm.as_ref(), &prompt).await?;
        metrics::record_grade("relevance", grade.binary_score);
        Ok(grade.binary_score)
    }
}

/// Documents kept after grading and whether web search must take over
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceVerdict {
    pub kept: Vec<Document>,
    pub needs_web_search: bool,
}

/// Apply a relevance policy to documents and their verdicts (same order)
pub fn apply_policy(
    documents: Vec<Document>,
    verdicts: &[bool],
    policy: RelevancePolicy,
    min_relevant: usize,
) -> RelevanceVerdict {
    match policy {
        RelevancePolicy::FilterAndFlag => {
            let kept: Vec<Document> = documents
                .into_iter()
                .zip(verdicts)
                .filter(|(_, relevant)| **relevant)
                .map(|(doc, _)| doc)
                .collect();
            let needs_web_search = kept.len() < min_relevant;
            RelevanceVerdict { kept, needs_web_search }
        }
        RelevancePolicy::FlagOnly => {
            let needs_web_search = documents.is_empty() || verdicts.iter().any(|relevant| !relevant);
            RelevanceVerdict {
                kept: documents,
                needs_web_search,
            }
        }
    }
}
