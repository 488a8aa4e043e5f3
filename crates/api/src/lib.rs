//! Classroom Monitor API Server
//!
//! REST control surface for the monitoring session, record browsing,
//! report suggestions and Prometheus metrics.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod error;
mod routes;

pub use config::{AppConfig, LoggingConfig};
pub use error::ApiError;

use camera_capture::{FrameSource, ImageSequenceSource};
use observation::AggregatorConfig;
use session::{
    Models, SessionError, SessionHandle, SessionState, SuggestionBoard, SuggestionService, SuggestionUpdate,
    SuggestionWorker,
};
use storage::{RecordId, Repository};

/// Builds a fresh, unopened camera for each new session
pub type CameraFactory = Box<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;

/// Application state shared across handlers
pub struct AppState {
    /// Storage repository
    pub repository: Arc<Repository>,
    /// Models shared by every session
    pub models: Arc<Models>,
    pub camera_factory: CameraFactory,
    pub aggregator: AggregatorConfig,
    /// Sleep between ticks of a running session
    pub tick_interval: Duration,
    /// Current session worker, if one was started and not yet stopped
    pub session: Option<SessionHandle>,
    /// Serializes session starts without holding the state lock
    pub start_gate: Arc<Mutex<()>>,
    pub suggestions: SuggestionWorker,
    /// Display surface fed by the suggestion worker
    pub board: Arc<RwLock<SuggestionBoard>>,
    pub metrics: PrometheusHandle,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state.
    ///
    /// Spawns the task that moves suggestion updates onto the board, so this
    /// must run inside a Tokio runtime.
    pub fn new(
        repository: Arc<Repository>,
        models: Arc<Models>,
        camera_factory: CameraFactory,
        suggestion_service: Arc<dyn SuggestionService>,
        metrics: PrometheusHandle,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let board = Arc::new(RwLock::new(SuggestionBoard::new()));
        spawn_suggestion_display(board.clone(), rx);

        Self {
            repository,
            models,
            camera_factory,
            aggregator: AggregatorConfig::default(),
            tick_interval: Duration::from_millis(10),
            session: None,
            start_gate: Arc::new(Mutex::new(())),
            suggestions: SuggestionWorker::new(suggestion_service, tx),
            board,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_session_config(mut self, aggregator: AggregatorConfig, tick_interval: Duration) -> Self {
        self.aggregator = aggregator;
        self.tick_interval = tick_interval;
        self
    }
}

/// Drain suggestion updates into the board until every sender is gone
pub fn spawn_suggestion_display(
    board: Arc<RwLock<SuggestionBoard>>,
    mut rx: mpsc::Receiver<(RecordId, SuggestionUpdate)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((record, update)) = rx.recv().await {
            board.write().await.apply(record, update);
        }
    })
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub session: SessionState,
    pub metrics: SystemMetrics,
}

/// Repository counts
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub student_count: usize,
    pub record_count: usize,
}

/// Create the application router
pub fn create_router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/session/start", post(routes::session::start))
        .route("/api/v1/session/pause", post(routes::session::pause))
        .route("/api/v1/session/stop", post(routes::session::stop))
        .route("/api/v1/session/status", get(routes::session::status))
        .route("/api/v1/session/toggles", put(routes::session::set_toggles))
        .route("/api/v1/session/frame", get(routes::session::frame))
        .route("/api/v1/records", get(routes::records::list))
        .route("/api/v1/records/:id", get(routes::records::details))
        .route(
            "/api/v1/records/:id/suggestions",
            post(routes::records::request_suggestions).get(routes::records::suggestions),
        )
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let session = match &state.session {
        Some(handle) => handle.status().await.map(|s| s.state).unwrap_or(SessionState::Stopped),
        None => SessionState::Idle,
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session,
        metrics: SystemMetrics {
            student_count: state.repository.student_count(),
            record_count: state.repository.record_count(),
        },
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<RwLock<AppState>>>) -> String {
    state.read().await.metrics.render()
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Seed the repository from configuration, then restore the last snapshot
fn open_repository(config: &AppConfig) -> anyhow::Result<Repository> {
    let repository = match &config.store.seed_path {
        Some(path) => Repository::from_seed_file(path)?,
        None => {
            warn!("No seed file configured, starting with an empty roster");
            Repository::new()
        }
    };

    if let Some(path) = &config.store.snapshot_path {
        if path.exists() {
            let restored = repository.load_snapshot(path)?;
            info!("Restored {} records from {}", restored, path.display());
        }
    }
    Ok(repository)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

/// Run the server
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let repository = Arc::new(open_repository(&config)?);
    let models = Arc::new(Models::load(&config.models)?);
    let metrics = PrometheusBuilder::new().install_recorder()?;

    let camera = config.camera.clone();
    let camera_factory: CameraFactory =
        Box::new(move || Box::new(ImageSequenceSource::from_config(&camera)) as Box<dyn FrameSource>);

    let state = AppState::new(
        repository.clone(),
        models,
        camera_factory,
        Arc::new(config.suggestions.clone()),
        metrics,
    )
    .with_session_config(config.session.aggregator.clone(), config.tick_interval());
    let state = Arc::new(RwLock::new(state));
    let app = create_router(state.clone());

    info!("Starting API server on {}", config.server.addr);

    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = state.write().await.session.take() {
        match handle.stop().await {
            Ok(summary) => info!("Stopped session {} on shutdown", summary.record_id),
            Err(SessionError::NotStarted | SessionError::AlreadyStopped) => {}
            Err(e) => warn!("Failed to stop session on shutdown: {}", e),
        }
    }

    if let Some(path) = &config.store.snapshot_path {
        repository.write_snapshot(path)?;
        info!("Wrote snapshot to {}", path.display());
    }

    Ok(())
}
