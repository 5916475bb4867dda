//! Grounding check of a generation against its documents

use ragwise_common::documents::format_context;
use ragwise_common::llm::{complete_typed, CompletionService, Prompt, StructuredOutput};
use ragwise_common::{metrics, Document, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM: &str = "You are a grader assessing whether an LLM generation is grounded in / supported by a set of retrieved facts.\n\
Give a binary score 'yes' or 'no'. 'Yes' means that the answer is grounded in / supported by the set of facts.";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GradeHallucinations {
    /// Answer is grounded in the facts, true or false
    pub binary_score: bool,
}

impl StructuredOutput for GradeHallucinations {
    const NAME: &'static str = "grade_hallucinations";
    const DESCRIPTION: &'static str = "Answer is grounded in the facts";
}

pub struct HallucinationGrader {
    llm: Arc<dyn CompletionService>,
}

impl HallucinationGrader {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// True when `generation` is supported by `documents`
    pub async fn grade(&self, documents: &[Document], generation: &str) -> Result<bool> {
        let prompt = Prompt::new(
            SYSTEM,
            format!(
                "Set of facts: \n\n {} \n\n LLM generation: {}",
                format_context(documents),
                generation
            ),
        );
        let grade: GradeHallucinations = complete_typed(self.llm.as_ref(), &prompt).await?;
        metrics::record_grade("hallucination", grade.binary_score);
        Ok(grade.binary_score)
    }
}
