//! HTTP handlers outside the chat socket.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use huddle_core::{GroupId, HistoryEntry};
use serde::Deserialize;

use crate::errors::ApiError;
use crate::health::{self, HealthResponse};
use crate::server::AppState;

/// History page size when `limit` is absent.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// Largest history page served.
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Query string of the history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Bearer token.
    pub token: Option<String>,
    /// Requested page size.
    pub limit: Option<usize>,
}

/// Clamp a requested page size into `1..=MAX_HISTORY_LIMIT`.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker = &state.chat.broker;
    Json(health::health_check(
        state.start_time,
        broker.connection_count(),
        broker.active_groups(),
    ))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET /api/groups/{group_id}/messages?token=&limit=
///
/// Most recent messages of a group, oldest first.
pub async fn group_history(
    Path(group_id): Path<GroupId>,
    Query(query): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let chat = &state.chat;
    if chat.verifier.verify(query.token.as_deref()).await.is_anonymous() {
        return Err(ApiError::Unauthorized);
    }
    if !chat.store.group_exists(group_id).await? {
        return Err(ApiError::GroupNotFound(group_id));
    }
    let entries = chat
        .store
        .message_history(group_id, clamp_limit(query.limit))
        .await?;
    Ok(Json(entries))
}
