//! Session Control Routes

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use session::{
    spawn_session, Collaborators, SessionController, SessionDetails, SessionError, SessionHandle, SessionState,
    SessionStatus, SessionSummary, SystemClock, Toggles,
};
use storage::RecordId;

use crate::{ApiError, AppState};

/// Response for start and resume
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub record_id: RecordId,
    pub state: SessionState,
}

/// Response for pause
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: SessionState,
}

fn current(state: &AppState) -> Result<SessionHandle, ApiError> {
    state.session.clone().ok_or(ApiError::Session(SessionError::NotStarted))
}

enum Launch {
    Resume(SessionHandle),
    Spawn(SessionController, Duration),
}

/// Start a new session, or resume the current one.
///
/// The state lock is only held to read the current handle and to store a
/// new one, never while the worker opens the camera.
pub async fn start(
    State(state): State<Arc<RwLock<AppState>>>,
    details: Option<Json<SessionDetails>>,
) -> Result<Json<StartResponse>, ApiError> {
    let gate = state.read().await.start_gate.clone();
    let _starting = gate.lock().await;

    let launch = {
        let guard = state.read().await;
        match guard.session.as_ref().filter(|h| !h.is_closed()) {
            Some(handle) => Launch::Resume(handle.clone()),
            None => {
                let details = details.map(|Json(d)| d).unwrap_or_default();
                info!("Starting session for class '{}'", details.class_id);
                let controller = SessionController::new(
                    guard.models.clone(),
                    Collaborators::from_repository(guard.repository.clone()),
                    (guard.camera_factory)(),
                    Box::new(SystemClock::new()),
                    details,
                    guard.aggregator.clone(),
                );
                Launch::Spawn(controller, guard.tick_interval)
            }
        }
    };

    let record_id = match launch {
        Launch::Resume(handle) => handle.start().await?,
        Launch::Spawn(controller, tick_interval) => {
            let (handle, _worker) = spawn_session(controller, tick_interval);
            // On failure the handle is dropped here and the idle worker exits
            let record_id = handle.start().await?;
            state.write().await.session = Some(handle);
            metrics::counter!("classroom_sessions_started_total").increment(1);
            record_id
        }
    };

    Ok(Json(StartResponse {
        record_id,
        state: SessionState::Running,
    }))
}

/// Toggle pause
pub async fn pause(State(state): State<Arc<RwLock<AppState>>>) -> Result<Json<StateResponse>, ApiError> {
    let handle = current(&*state.read().await)?;
    let state = handle.pause().await?;
    Ok(Json(StateResponse { state }))
}

/// Stop the session and return its summary
pub async fn stop(State(state): State<Arc<RwLock<AppState>>>) -> Result<Json<SessionSummary>, ApiError> {
    let mut state = state.write().await;
    let handle = current(&state)?;
    let summary = handle.stop().await?;
    state.session = None;
    Ok(Json(summary))
}

pub async fn status(State(state): State<Arc<RwLock<AppState>>>) -> Result<Json<SessionStatus>, ApiError> {
    let handle = current(&*state.read().await)?;
    Ok(Json(handle.status().await?))
}

pub async fn set_toggles(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(toggles): Json<Toggles>,
) -> Result<Json<Toggles>, ApiError> {
    let handle = current(&*state.read().await)?;
    Ok(Json(handle.set_toggles(toggles).await?))
}

/// Latest annotated frame as PNG, or 204 before the first tick
pub async fn frame(State(state): State<Arc<RwLock<AppState>>>) -> Result<Response, ApiError> {
    let handle = current(&*state.read().await)?;
    Ok(match handle.frame_png().await? {
        Some(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
