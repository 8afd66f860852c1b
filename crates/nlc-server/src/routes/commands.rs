//! Command endpoint.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use nlc_protocol::{PipelineResult, SessionId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for processing a command.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    /// Natural-language command text.
    pub text: String,
    /// Conversation to continue; the default session when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /api/v1/commands: run one command through the pipeline.
///
/// Pipeline failures are reported in the body with `success = false`.
pub async fn process_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> ApiResult<Json<PipelineResult>> {
    let session = match req.session_id {
        Some(id) if id.trim().is_empty() => {
            return Err(ApiError::BadRequest("session_id must not be blank".into()));
        }
        Some(id) => SessionId::new(id.trim()),
        None => SessionId::default(),
    };

    let result = state.coordinator.process(&session, &req.text).await;
    Ok(Json(result))
}
