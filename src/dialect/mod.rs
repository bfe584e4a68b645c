//! The Dialect Tools Facade: thin typed wrappers around
//! `sqlparser`, the crate's external dialect library collaborator.

pub mod facade;

pub use facade::{
    DialectFacade, ErrorAssist, Metadata, TranspileOutcome, ValidationOutcome,
};
