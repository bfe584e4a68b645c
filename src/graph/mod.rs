pub mod builder;
pub mod classifier;

pub use builder::{GraphBuildResult, SchemaGraph};
pub use classifier::{classify_table, ClassificationInput, ClassificationResult};
