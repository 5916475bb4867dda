//! Turn state machine
//!
//! Steps report an [`Outcome`]; the next step is looked up in
//! [`TRANSITIONS`] rather than decided inside the step.

use ragwise_common::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Node {
    Route,
    Retrieve,
    GradeDocuments,
    #[serde(rename = "WEBSEARCH")]
    WebSearch,
    Generate,
    End,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Route => "ROUTE",
            Node::Retrieve => "RETRIEVE",
            Node::GradeDocuments => "GRADE_DOCUMENTS",
            Node::WebSearch => "WEBSEARCH",
            Node::Generate => "GENERATE",
            Node::End => "END",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    RoutedToVectorstore,
    RoutedToWebSearch,
    Retrieved,
    DocumentsInsufficient,
    DocumentsRelevant,
    Searched,
    NotSupported,
    NotUseful,
    Useful,
    RetryBudgetExhausted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::RoutedToVectorstore => "routed_to_vectorstore",
            Outcome::RoutedToWebSearch => "routed_to_web_search",
            Outcome::Retrieved => "retrieved",
            Outcome::DocumentsInsufficient => "documents_insufficient",
            Outcome::DocumentsRelevant => "documents_relevant",
            Outcome::Searched => "searched",
            Outcome::NotSupported => "not_supported",
            Outcome::NotUseful => "not_useful",
            Outcome::Useful => "useful",
            Outcome::RetryBudgetExhausted => "retry_budget_exhausted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry state of every turn
pub const START: Node = Node::Route;

/// (from, outcome) -> to
pub const TRANSITIONS: &[(Node, Outcome, Node)] = &[
    (Node::Route, Outcome::RoutedToVectorstore, Node::Retrieve),
    (Node::Route, Outcome::RoutedToWebSearch, Node::WebSearch),
    (Node::Retrieve, Outcome::Retrieved, Node::GradeDocuments),
    (Node::GradeDocuments, Outcome::DocumentsInsufficient, Node::WebSearch),
    (Node::GradeDocuments, Outcome::DocumentsRelevant, Node::Generate),
    (Node::WebSearch, Outcome::Searched, Node::Generate),
    (Node::Generate, Outcome::NotSupported, Node::Generate),
    (Node::Generate, Outcome::NotUseful, Node::WebSearch),
    (Node::Generate, Outcome::Useful, Node::End),
    (Node::Generate, Outcome::RetryBudgetExhausted, Node::End),
];

/// Next state for an outcome reported by `from`
pub fn next(from: Node, outcome: Outcome) -> Result<Node> {
    TRANSITIONS
        .iter()
        .find(|(f, o, _)| *f == from && *o == outcome)
        .map(|(_, _, to)| *to)
        .ok_or_else(|| AppError::Internal {
            message: format!("no transition from {} on {}", from, outcome),
        })
}

fn mermaid_id(node: Node) -> &'static str {
    match node {
        // "end" is a Mermaid keyword
        Node::End => "__end__",
        other => other.as_str(),
    }
}

/// Mermaid flowchart of the state machine
pub fn to_mermaid() -> String {
    let mut out = String::from("flowchart TD\n");
    out.push_str(&format!("    __start__([start]) --> {}\n", mermaid_id(START)));
    for (from, outcome, to) in TRANSITIONS {
        out.push_str(&format!(
            "    {} -->|{}| {}\n",
            mermaid_id(*from),
            outcome,
            mermaid_id(*to)
        ));
    }
    out.push_str("    __end__([end])\n");
    out
}
