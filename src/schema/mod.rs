//! Schema Card construction, the derived-cache accessor built on
//! top of it, and the Init Manager that owns the build/rebuild
//! lifecycle.

pub mod card;
pub mod manager;
pub mod overview;
pub mod service;
pub mod table_info;

pub use card::{build_schema_card, SchemaCard};
pub use manager::{InitManager, InitPhase, InitStatus};
pub use overview::{build_database_summary, list_subject_areas};
pub use service::{LexicalWeights, SchemaService};
pub use table_info::build_table_info;
