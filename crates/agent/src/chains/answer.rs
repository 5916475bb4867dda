//! Usefulness check of a generation against the question

use ragwise_common::llm::{complete_typed, CompletionService, Prompt, StructuredOutput};
use ragwise_common::{metrics, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM: &str = "You are a grader assessing whether an answer addresses / resolves a question.\n\
Give a binary score 'yes' or 'no'. 'Yes' means that the answer resolves the question.";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GradeAnswer {
    /// Answer addresses the question, true or false
    pub binary_score: bool,
}

impl StructuredOutput for GradeAnswer {
    const NAME: &'static str = "grade_answer";
    const DESCRIPTION: &'static str = "Answer addresses the question";
}

pub struct AnswerGrader {
    llm: Arc<dyn CompletionService>,
}

impl AnswerGrader {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// True when `generation` resolves `question`
    pub async fn grade(&self, question: &str, generation: &str) -> Result<bool> {
        let prompt = Prompt::new(
            SYSTEM,
            format!("User question: \n\n {} \n\n LLM generation: {}", question, generation),
        );
        let grade: GradeAnswer = complete_typed(self.llm.as_ref(), &prompt).await?;
        metrics::record_grade("answer", grade.binary_score);
        Ok(grade.binary_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::HallucinationGrader;
    use crate::testing::ScriptedCompletion;
    use ragwise_common::{Document, DocumentOrigin};

    #[tokio::test]
    async fn test_graders_use_their_own_schemas() {
        let llm = ScriptedCompletion::new().grounded(&[false]).useful(&[true]);
        let docs = vec![Document::new("Paris is the capital of France", DocumentOrigin::WebSearch)];

        assert!(!HallucinationGrader::new(llm.clone()).grade(&docs, "Lyon").await.unwrap());
        assert!(AnswerGrader::new(llm.clone()).grade("Capital?", "Paris").await.unwrap());

        assert!(llm.last_user("grade_hallucinations").unwrap().contains("Paris is the capital"));
        assert!(llm.last_user("grade_answer").unwrap().contains("Capital?"));
        assert_eq!(llm.calls("grade_hallucinations"), 1);
        assert_eq!(llm.calls("grade_answer"), 1);
    }
}
