//! API handlers module

pub mod ask;
pub mod documents;
pub mod graph;
pub mod health;
