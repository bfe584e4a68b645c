//! CLI interface for schemamind. `serve` is the primary mode; `status`,
//! `overview`, and `reflect` are operator-facing introspection/maintenance
//! commands layered over the same `AppContext`.

pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use output::OutputMode;

use crate::init::AppContext;
use crate::schema::{build_database_summary, InitPhase};

/// schemamind - database intelligence for LLM agents
#[derive(Parser)]
#[command(name = "schemamind", version, about, long_about = None)]
pub struct Cli {
    /// Override data directory (default: ~/.schemamind)
    #[arg(long, env = "SCHEMAMIND_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Override the database connection string
    #[arg(long, env = "SCHEMAMIND_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable the optional find_tables/find_columns debug tools
    #[arg(long, global = true)]
    pub debug_tools: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the MCP server (stdio transport)
    Serve,

    /// Print the Init Manager's current lifecycle phase
    Status,

    /// Print the database overview (subject areas, important tables, patterns)
    Overview {
        #[arg(long)]
        include_subject_areas: bool,
        #[arg(long, default_value = "8")]
        area_limit: usize,
    },

    /// Force a fresh background schema build
    Reflect {
        /// Also warm the embedding model before returning (blocks until
        /// warmup completes, rather than leaving it as a background task)
        #[arg(long)]
        warm_embeddings: bool,
    },
}

/// Execute a CLI command against a shared `AppContext`.
pub async fn execute(command: &Commands, ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let mode = OutputMode::from_json_flag(json);

    match command {
        Commands::Serve => unreachable!("serve is handled directly in main"),

        Commands::Status => {
            let status = ctx.init_manager.status();
            match mode {
                OutputMode::Json => output::output_json(&status),
                _ => {
                    output::print_header("Init status");
                    output::print_kv("phase", &format!("{:?}", status.phase));
                    output::print_kv("attempts", &status.attempts.to_string());
                    output::print_kv("description", &status.description);
                    if let Some(err) = &status.error_message {
                        output::print_kv("error", err);
                    }
                    output::print_kv(
                        "enrichment_in_progress",
                        &status.enrichment_in_progress.to_string(),
                    );
                }
            }
        }

        Commands::Overview {
            include_subject_areas,
            area_limit,
        } => {
            let service = ctx.init_manager.get_schema_service()?;
            let summary = build_database_summary(&service.card, *include_subject_areas, *area_limit);
            match mode {
                OutputMode::Json => output::output_json(&summary),
                _ => {
                    output::print_header("Database overview");
                    output::print_kv("dialect", &summary.dialect);
                    output::print_kv("total_tables", &summary.total_tables.to_string());
                    output::print_kv("schemas", &summary.schemas.join(", "));
                    if !summary.common_patterns.is_empty() {
                        output::print_kv("patterns", &summary.common_patterns.join(", "));
                    }
                    output::print_table(
                        &["table", "archetype", "centrality", "summary"],
                        summary
                            .most_important_tables
                            .iter()
                            .map(|t| {
                                vec![
                                    t.table.clone(),
                                    t.archetype.clone(),
                                    format!("{:.2}", t.centrality),
                                    t.summary.clone(),
                                ]
                            })
                            .collect(),
                    );
                }
            }
        }

        Commands::Reflect { warm_embeddings } => {
            output::print_hint("Spawning a fresh background schema build...");
            ctx.init_manager.start(ctx.config.clone());
            ctx.init_manager.wait_until_ready().await;
            if *warm_embeddings {
                output::print_hint("Waiting for embedding warmup to settle...");
                while ctx.init_manager.phase() == InitPhase::Ready
                    && !ctx
                        .init_manager
                        .get_schema_service()
                        .map(|s| s.embeddings_available())
                        .unwrap_or(false)
                {
                    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
                }
            }
            output::print_success("Schema build complete.");
        }
    }

    Ok(())
}
