//! The Execution Runner: SELECT-only guard, dialect
//! auto-transpilation, bounded execution, and row/cell truncation.

pub mod runner;

pub use runner::ExecutionRunner;
