//! Model-backed steps of a turn
//!
//! Each chain pairs a prompt with one completion mode: structured output
//! for the router and the graders, free text for the answer generator.

mod answer;
mod generator;
mod hallucination;
mod relevance;
mod router;

pub use answer::{AnswerGrader, GradeAnswer};
pub use generator::AnswerGenerator;
pub use hallucination::{GradeHallucinations, HallucinationGrader};
pub use relevance::{apply_policy, GradeDocuments, RelevanceGrader, RelevanceVerdict};
pub use router::{Datasource, RouteQuery, Router};
