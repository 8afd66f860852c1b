//! Provider health and intent catalog endpoints.

use axum::Json;
use axum::extract::State;

use nlc_pipeline::IntentSpec;
use nlc_protocol::ProviderStatus;

use crate::state::AppState;

/// GET /api/v1/providers: registered providers in priority order.
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderStatus>> {
    Json(state.coordinator.router().statuses().await)
}

/// GET /api/v1/intents: supported intents and their parameter schemas.
pub async fn list_intents(State(state): State<AppState>) -> Json<Vec<IntentSpec>> {
    Json(state.coordinator.catalog().iter().cloned().collect())
}
