//! Record Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use session::SuggestionUpdate;
use storage::{RecordDetails, RecordId, SessionRecord};

use crate::{ApiError, AppState};

/// Query parameters for the records endpoint
#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for the records endpoint
#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub data: Vec<SessionRecord>,
    pub count: usize,
}

/// Most recent records first
pub async fn list(
    State(state): State<Arc<RwLock<AppState>>>,
    Query(params): Query<RecordQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let data = state.read().await.repository.get_records(params.limit)?;
    let count = data.len();
    Ok(Json(RecordsResponse { data, count }))
}

/// One record with its behavior and emotion histories
pub async fn details(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<RecordId>,
) -> Result<Json<RecordDetails>, ApiError> {
    Ok(Json(state.read().await.repository.get_record(id)?))
}

/// Kick off a suggestion fetch over the record's aggregated labels
pub async fn request_suggestions(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<RecordId>,
) -> Result<(StatusCode, Json<SuggestionUpdate>), ApiError> {
    let state = state.read().await;
    let details = state.repository.get_record(id)?;
    state
        .suggestions
        .request(id, details.emotion_labels(), details.behavior_labels());
    Ok((StatusCode::ACCEPTED, Json(SuggestionUpdate::Pending)))
}

/// What the display surface currently shows for the record
pub async fn suggestions(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(id): Path<RecordId>,
) -> Result<Json<SuggestionUpdate>, ApiError> {
    let board = state.read().await.board.clone();
    let update = board.read().await.get(&id).cloned();
    update
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Suggestions for record {}", id)))
}
