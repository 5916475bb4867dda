//! Question router

use ragwise_common::llm::{complete_typed, CompletionService, Prompt, StructuredOutput};
use ragwise_common::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Where a question is answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
#[schemars(inline)]
pub enum Datasource {
    Vectorstore,
    Websearch,
}

/// Structured routing decision
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RouteQuery {
    /// Given a user question choose to route it to web search or a vectorstore.
    pub datasource: Datasource,
}

impl StructuredOutput for RouteQuery {
    const NAME: &'static str = "route_query";
    const DESCRIPTION: &'static str = "Route a user query to the most relevant datasource.";
}

/// Chooses between the local store and web search
pub struct Router {
    llm: Arc<dyn CompletionService>,
    system: String,
}

impl Router {
    /// `topics` describes what the vectorstore holds
    pub fn new(llm: Arc<dyn CompletionService>, topics: &str) -> Self {
        let system = format!(
            "You are an expert at routing a user question to a vectorstore or web search.\n\
             The vectorstore contains documents related to {}.\n\
             Use the vectorstore for questions on these topics. For all else, use web-search.",
            topics
        );
        Self { llm, system }
    }

    pub async fn route(&self, question: &str) -> Result<Datasource> {
        let prompt = Prompt::new(&self.system, question);
        let decision: RouteQuery = complete_typed(self.llm.as_ref(), &prompt).await?;
        debug!(datasource = ?decision.datasource, "Question routed");
        Ok(decision.datasource)
    }
}
