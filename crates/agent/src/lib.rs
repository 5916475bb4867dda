//! Ragwise agent
//!
//! An adaptive retrieval-augmented answering agent. A turn routes the
//! question to the local document store or to web search, grades retrieved
//! documents for relevance, generates an answer and then checks it for
//! grounding and usefulness, looping back when a check fails.
//!
//! The control flow is a small state machine ([`graph`]) driven by the
//! [`Agent`] orchestrator. Each step delegates to a chain in [`chains`].

pub mod chains;
pub mod graph;
pub mod orchestrator;
pub mod retriever;
pub mod state;
pub mod stream;

mod guard;

#[cfg(test)]
mod testing;

pub use graph::{Node, Outcome};
pub use orchestrator::{Agent, TurnOutput, TurnStatus};
pub use state::{Question, SessionState};
pub use stream::{TurnEvent, TurnStream};

/// Returned without calling the model when a turn has no documents to answer from
pub const NO_CONTEXT_ANSWER: &str =
    "I don't know. No relevant context was found to answer this question.";

/// Returned when the generation budget runs out under the sentinel fallback
pub const UNGROUNDED_ANSWER_SENTINEL: &str =
    "I could not produce an answer grounded in the available sources.";
