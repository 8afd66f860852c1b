//! Shared application state for the Axum server.

use std::sync::Arc;

use nlc_pipeline::{Coordinator, IntentCatalog, PipelineConfig};
use nlc_providers::{ProviderRouter, build_router};

use crate::config::ServerConfig;
use crate::document::InMemoryDocument;

/// Shared application state; cheap to clone into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// The document behind both host collaborators.
    pub document: Arc<InMemoryDocument>,
}

impl AppState {
    /// Wire a coordinator around a fresh in-memory document.
    pub fn new(pipeline: PipelineConfig, router: ProviderRouter) -> Self {
        let document = Arc::new(InMemoryDocument::new());
        let coordinator = Coordinator::new(
            pipeline,
            Arc::new(IntentCatalog::cad()),
            Arc::new(router),
            document.clone(),
            document.clone(),
        );
        Self {
            coordinator: Arc::new(coordinator),
            document,
        }
    }

    /// Build state from configuration, registering every usable provider.
    pub async fn from_config(config: &ServerConfig) -> Self {
        let router = build_router(&config.providers).await;
        if !router.has_providers() {
            tracing::warn!("no AI providers registered, generative commands will fail");
        }
        Self::new(config.pipeline.clone(), router)
    }
}
