//! The Init Manager: a process-wide singleton that drives the
//! cold-start readiness sequence — engine → connectivity → reflection →
//! profile → graph → embeddings → indices → READY → enrichment — and keeps
//! the current `SchemaCard`/`SchemaService` pair available to readers via
//! an atomic swap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::db::connection::{self, SchemaDb};
use crate::embedding::{Embedder, EmbeddingConfig, LocalEmbeddingService, NoopEmbedder};
use crate::error::SchemaMindError;
use crate::schema::card::{build_schema_card, SchemaCard};
use crate::schema::service::SchemaService;

/// Lifecycle phase. Advances monotonically except
/// into the terminal `Failed`/`Stopped` states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitPhase {
    Idle,
    Starting,
    Running,
    Ready,
    Failed,
    Stopped,
}

impl InitPhase {
    fn description(&self) -> &'static str {
        match self {
            InitPhase::Idle => "waiting to start",
            InitPhase::Starting => "connecting to the database",
            InitPhase::Running => "reflecting and profiling the schema",
            InitPhase::Ready => "ready to serve requests",
            InitPhase::Failed => "initialization failed",
            InitPhase::Stopped => "service stopped",
        }
    }
}

/// `get_init_status()`'s wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InitStatus {
    pub phase: InitPhase,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
    pub description: String,
    pub enrichment_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enrichment_completed_at: Option<DateTime<Utc>>,
}

struct InitStateInner {
    phase: InitPhase,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    enrichment_in_progress: bool,
    enrichment_completed_at: Option<DateTime<Utc>>,
}

impl Default for InitStateInner {
    fn default() -> Self {
        Self {
            phase: InitPhase::Idle,
            started_at: None,
            completed_at: None,
            error_message: None,
            enrichment_in_progress: false,
            enrichment_completed_at: None,
        }
    }
}

/// The process-wide singleton lifecycle manager.
pub struct InitManager {
    state: RwLock<InitStateInner>,
    attempts: AtomicUsize,
    service: RwLock<Option<Arc<SchemaService>>>,
    db: RwLock<Option<Arc<SchemaDb>>>,
    ready_signal: Notify,
}

impl InitManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(InitStateInner::default()),
            attempts: AtomicUsize::new(0),
            service: RwLock::new(None),
            db: RwLock::new(None),
            ready_signal: Notify::new(),
        })
    }

    /// Spawn exactly one background startup worker. Returns
    /// immediately; the service exposes a status surface while the worker
    /// runs.
    pub fn start(self: &Arc<Self>, config: Config) {
        let manager = Arc::clone(self);
        self.set_phase(InitPhase::Starting);
        tokio::spawn(async move {
            manager.run_startup(config).await;
        });
    }

    #[instrument(skip(self, config))]
    async fn run_startup(self: Arc<Self>, config: Config) {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let db = match connection::connect(&config.database_url).await {
            Ok(db) => Arc::new(db),
            Err(e) => {
                self.fail(format!("connectivity probe failed: {e}"));
                return;
            }
        };
        *self.db.write().expect("db lock poisoned") = Some(Arc::clone(&db));

        self.set_phase(InitPhase::Running);

        let mut fast_config = config.clone();
        fast_config.fast_startup = true;

        let card = match build_schema_card(&db, &fast_config).await {
            Ok(card) => Arc::new(card),
            Err(e) => {
                self.fail(format!("initial reflection failed: {e}"));
                return;
            }
        };

        let noop: Arc<dyn Embedder> = Arc::new(NoopEmbedder::new(384));
        let service = Arc::new(SchemaService::build(Arc::clone(&card), noop, &config).await);
        *self.service.write().expect("service lock poisoned") = Some(service);

        self.set_ready();

        let manager = Arc::clone(&self);
        let warmup_config = config.clone();
        let warmup_card = Arc::clone(&card);
        tokio::spawn(async move {
            manager.run_warmup(warmup_card, warmup_config).await;
        });

        let manager = Arc::clone(&self);
        let enrichment_config = config.clone();
        tokio::spawn(async move {
            manager.run_enrichment(db, enrichment_config).await;
        });
    }

    /// Build the real embedder and re-index the current card with it,
    /// swapping in the richer `SchemaService` once ready.
    #[instrument(skip(self, card, config))]
    async fn run_warmup(self: Arc<Self>, card: Arc<SchemaCard>, config: Config) {
        let embedding_config = EmbeddingConfig {
            model_repo: config.embedding_model.clone(),
            ..Default::default()
        };
        let embedder = match tokio::task::spawn_blocking(move || LocalEmbeddingService::new(embedding_config))
            .await
        {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => {
                warn!("embedding warmup failed: {e}; continuing lexical-only");
                return;
            }
            Err(e) => {
                warn!("embedding warmup task panicked: {e}; continuing lexical-only");
                return;
            }
        };

        if !embedder.is_available() {
            info!("embedding model unavailable; staying lexical-only");
            return;
        }

        let embedder: Arc<dyn Embedder> = Arc::new(embedder);
        let service = Arc::new(SchemaService::build(Arc::clone(&card), embedder, &config).await);
        *self.service.write().expect("service lock poisoned") = Some(service);
        info!("embedding warmup complete; semantic retrieval enabled");
    }

    /// Re-run the full pipeline with `fast_startup=false` and no table cap,
    /// then atomically swap in the enriched card/service pair.
    #[instrument(skip(self, db, config))]
    async fn run_enrichment(self: Arc<Self>, db: Arc<SchemaDb>, config: Config) {
        {
            let mut state = self.state.write().expect("state lock poisoned");
            state.enrichment_in_progress = true;
        }

        let mut full_config = config.clone();
        full_config.fast_startup = false;

        let card = match build_schema_card(&db, &full_config).await {
            Ok(card) => Arc::new(card),
            Err(e) => {
                error!("enrichment pass failed: {e}");
                let mut state = self.state.write().expect("state lock poisoned");
                state.enrichment_in_progress = false;
                state.error_message = Some(format!("enrichment failed: {e}"));
                return;
            }
        };

        let embedder: Arc<dyn Embedder> = match self.current_embedder(&config).await {
            Some(e) => e,
            None => Arc::new(NoopEmbedder::new(384)),
        };

        let service = Arc::new(SchemaService::build(Arc::clone(&card), embedder, &config).await);
        *self.service.write().expect("service lock poisoned") = Some(service);

        let mut state = self.state.write().expect("state lock poisoned");
        state.enrichment_in_progress = false;
        state.enrichment_completed_at = Some(Utc::now());
        info!("enrichment complete; schema card swapped atomically");
    }

    /// Rebuild an embedder for the enrichment pass from the currently active
    /// service, so enrichment keeps whatever retrieval capability warmup
    /// already established instead of silently dropping back to lexical-only.
    async fn current_embedder(&self, config: &Config) -> Option<Arc<dyn Embedder>> {
        let has_embeddings = self
            .service
            .read()
            .expect("service lock poisoned")
            .as_ref()
            .map(|s| s.embeddings_available())
            .unwrap_or(false);
        if !has_embeddings {
            return None;
        }
        let embedding_config = EmbeddingConfig {
            model_repo: config.embedding_model.clone(),
            ..Default::default()
        };
        match tokio::task::spawn_blocking(move || LocalEmbeddingService::new(embedding_config)).await {
            Ok(Ok(service)) if service.is_available() => {
                let embedder: Arc<dyn Embedder> = Arc::new(service);
                Some(embedder)
            }
            _ => None,
        }
    }

    fn set_phase(&self, phase: InitPhase) {
        let mut state = self.state.write().expect("state lock poisoned");
        if state.started_at.is_none() {
            state.started_at = Some(Utc::now());
        }
        state.phase = phase;
    }

    fn set_ready(&self) {
        let mut state = self.state.write().expect("state lock poisoned");
        state.phase = InitPhase::Ready;
        state.completed_at = Some(Utc::now());
        drop(state);
        self.ready_signal.notify_waiters();
    }

    fn fail(&self, message: String) {
        error!("init manager failed: {message}");
        let mut state = self.state.write().expect("state lock poisoned");
        state.phase = InitPhase::Failed;
        state.error_message = Some(message);
    }

    pub fn phase(&self) -> InitPhase {
        self.state.read().expect("state lock poisoned").phase
    }

    pub fn status(&self) -> InitStatus {
        let state = self.state.read().expect("state lock poisoned");
        InitStatus {
            phase: state.phase,
            attempts: self.attempts.load(Ordering::SeqCst),
            started_at: state.started_at,
            completed_at: state.completed_at,
            error_message: state.error_message.clone(),
            description: state.phase.description().to_string(),
            enrichment_in_progress: state.enrichment_in_progress,
            enrichment_completed_at: state.enrichment_completed_at,
        }
    }

    /// Read APIs refuse service outside `READY`.
    pub fn get_schema_service(&self) -> Result<Arc<SchemaService>, SchemaMindError> {
        let phase = self.phase();
        match phase {
            InitPhase::Ready => self
                .service
                .read()
                .expect("service lock poisoned")
                .clone()
                .ok_or_else(|| SchemaMindError::NotReady("schema service not yet built".into())),
            InitPhase::Failed => Err(SchemaMindError::NotReady(format!(
                "initialization failed: {}",
                self.state
                    .read()
                    .expect("state lock poisoned")
                    .error_message
                    .clone()
                    .unwrap_or_default()
            ))),
            InitPhase::Stopped => Err(SchemaMindError::NotReady("service has stopped".into())),
            InitPhase::Idle | InitPhase::Starting | InitPhase::Running => Err(
                SchemaMindError::NotReady("SchemaService initialization in progress".into()),
            ),
        }
    }

    /// The live database handle, gated the same way as `get_schema_service`.
    pub fn get_db(&self) -> Result<Arc<SchemaDb>, SchemaMindError> {
        let phase = self.phase();
        match phase {
            InitPhase::Ready => self
                .db
                .read()
                .expect("db lock poisoned")
                .clone()
                .ok_or_else(|| SchemaMindError::NotReady("database handle not yet built".into())),
            InitPhase::Failed => Err(SchemaMindError::NotReady(format!(
                "initialization failed: {}",
                self.state
                    .read()
                    .expect("state lock poisoned")
                    .error_message
                    .clone()
                    .unwrap_or_default()
            ))),
            InitPhase::Stopped => Err(SchemaMindError::NotReady("service has stopped".into())),
            InitPhase::Idle | InitPhase::Starting | InitPhase::Running => Err(
                SchemaMindError::NotReady("SchemaService initialization in progress".into()),
            ),
        }
    }

    pub async fn wait_until_ready(&self) {
        if self.phase() == InitPhase::Ready {
            return;
        }
        self.ready_signal.notified().await;
    }

    /// Dispose database resources and transition to `Stopped`.
    pub async fn shutdown(&self) {
        if let Some(db) = self.db.write().expect("db lock poisoned").take() {
            db.pool.close().await;
        }
        let mut state = self.state.write().expect("state lock poisoned");
        state.phase = InitPhase::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manager_starts_idle() {
        let manager = InitManager::new();
        assert_eq!(manager.phase(), InitPhase::Idle);
    }

    #[test]
    fn get_schema_service_fails_before_ready() {
        let manager = InitManager::new();
        let err = manager.get_schema_service().unwrap_err();
        assert_eq!(err.to_string(), "not ready: SchemaService initialization in progress");
    }

    #[test]
    fn status_reports_phase_description() {
        let manager = InitManager::new();
        let status = manager.status();
        assert_eq!(status.phase, InitPhase::Idle);
        assert!(!status.description.is_empty());
    }
}
