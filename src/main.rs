//! schemamind - database intelligence for LLM agents
//!
//! Usage:
//!   schemamind serve              Start MCP server on stdio
//!   schemamind status             Print Init Manager lifecycle phase
//!   schemamind overview           Print database overview
//!   schemamind reflect            Force a fresh background schema build
//!   schemamind --help             Show all commands

use anyhow::Result;
use clap::Parser;

use schemamind::cli::{Cli, Commands};
use schemamind::init::AppContext;
use schemamind::mcp::run_mcp_server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr (safe for MCP stdio transport)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("schemamind=info".parse()?),
        )
        .init();

    let mut ctx = AppContext::new(cli.data_path.clone(), cli.database_url.clone()).await?;
    if cli.debug_tools {
        ctx.config.debug_tools_enabled = true;
    }

    match &cli.command {
        Commands::Serve => {
            run_mcp_server(ctx).await?;
        }
        cmd => {
            schemamind::cli::execute(cmd, &ctx, cli.json).await?;
        }
    }

    Ok(())
}
