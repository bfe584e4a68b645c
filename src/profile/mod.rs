pub mod entity;
pub mod gazetteer;
pub mod profiler;

pub use entity::{recognize_entities, EntityMatch};
pub use profiler::{profile_column, ColumnEvidence};
