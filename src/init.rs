//! Shared application context: config resolution, the Init Manager's
//! background startup, and the `GET /health` endpoint. Shared between the
//! MCP server and the CLI (constructed once in `main.rs`, handed to
//! whichever entry point runs).
//!
//! `AppContext::new` returns as soon as `InitManager::start` has been
//! kicked off: readiness is a background process the rest of the service
//! polls or awaits via `InitManager::wait_until_ready`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::config::Config;
use crate::dialect::DialectFacade;
use crate::schema::InitManager;
use crate::SchemaMindError;

/// Shared application context. Cheap to clone: every field is an `Arc` or a
/// cheap-to-clone wrapper (`DialectFacade`'s cache is an `Arc` inside).
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub init_manager: Arc<InitManager>,
    pub dialect: DialectFacade,
}

impl AppContext {
    /// Resolve configuration (data path priority: explicit > `SCHEMAMIND_DATA_PATH`
    /// env > `./.schemamind` if present > `~/.schemamind`), then kick off
    /// background startup. Returns as soon
    /// as the startup worker has been spawned; callers that need a ready
    /// service should call `init_manager.wait_until_ready()`.
    pub async fn new(
        explicit_data_path: Option<PathBuf>,
        explicit_database_url: Option<String>,
    ) -> Result<Self, SchemaMindError> {
        let data_path = Config::resolve_data_path(explicit_data_path);
        tracing::info!("Using data path: {}", data_path.display());

        let config = Config::load(&data_path, explicit_database_url)?;
        tracing::info!(
            row_limit = config.row_limit,
            embedding_model = %config.embedding_model,
            "Configuration loaded"
        );

        let init_manager = InitManager::new();
        init_manager.start(config.clone());
        tracing::info!("Init Manager startup worker spawned");

        let dialect = DialectFacade::new();

        Ok(Self {
            config,
            init_manager,
            dialect,
        })
    }

    /// Spawn the `GET /health` endpoint: always 200,
    /// `{"status":"healthy","service":"schemamind"}` once `READY`, with the
    /// current init phase included while still starting up. Runs for the
    /// life of the process; callers don't await this.
    pub fn spawn_health_server(&self) {
        let addr = self.config.health_addr.clone();
        let init_manager = Arc::clone(&self.init_manager);

        tokio::spawn(async move {
            let app = Router::new().route(
                "/health",
                get(move || {
                    let init_manager = Arc::clone(&init_manager);
                    async move {
                        let status = init_manager.status();
                        Json(json!({
                            "status": "healthy",
                            "service": "schemamind",
                            "phase": status.phase,
                        }))
                    }
                }),
            );

            match tokio::net::TcpListener::bind(&addr).await {
                Ok(listener) => {
                    tracing::info!("Health endpoint listening on {addr}");
                    if let Err(e) = axum::serve(listener, app).await {
                        tracing::error!("Health endpoint stopped: {e}");
                    }
                }
                Err(e) => {
                    tracing::warn!("Could not bind health endpoint on {addr}: {e}");
                }
            }
        });
    }
}
