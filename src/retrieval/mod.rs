//! The Retrieval Engine: ranks candidate tables for a free-form
//! query by combining a lexical token-weight model with embedding search,
//! plus the Graph Expander that augments a seed selection with
//! useful neighbors.

pub mod engine;
pub mod expansion;

pub use engine::{RetrievalEngine, RetrievalStrategy, ScoredTable};
pub use expansion::{ExpansionStrategy, GraphExpander};
