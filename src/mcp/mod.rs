pub mod error;
pub mod server;
pub mod types;

pub use server::{run_mcp_server, SchemaMindServer};
