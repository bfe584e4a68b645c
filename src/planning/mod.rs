//! The Plan Builder: turns a selected table set and free-form
//! query text into a structured `QueryPlan`.

pub mod builder;

pub use builder::{PlanBudget, PlanBuilder};
