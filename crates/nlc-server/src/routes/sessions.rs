//! Session history endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use nlc_protocol::{ConversationContext, SessionId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/sessions: known session ids.
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionId>> {
    Json(state.coordinator.sessions().ids())
}

/// GET /api/v1/sessions/{id}: recent turns and the last scene snapshot.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationContext>> {
    let store = state
        .coordinator
        .sessions()
        .get(&SessionId::new(&id))
        .ok_or_else(|| ApiError::NotFound(format!("session '{id}' not found")))?;
    Ok(Json(store.get_current().await))
}

/// DELETE /api/v1/sessions/{id}: forget a conversation.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.coordinator.sessions().remove(&SessionId::new(&id)) {
        tracing::info!(session = %id, "session removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session '{id}' not found")))
    }
}
