//! Shared test harness for E2E integration tests.
//!
//! Wires the HTTP router, the pipeline coordinator, and the in-memory
//! document together, with providers pointed at scripted backends or
//! wiremock servers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::MockServer;

use nlc_pipeline::PipelineConfig;
use nlc_providers::ollama::{OllamaBackend, OllamaConfig};
use nlc_providers::openai::{OpenAiBackend, OpenAiConfig};
use nlc_providers::{AiBackend, ProviderRouter, RouterSettings, ScriptedBackend};
use nlc_server::{AppState, build_router};

/// Router settings with short timeouts so failure paths stay fast.
pub fn fast_settings() -> RouterSettings {
    RouterSettings {
        timeout: Duration::from_millis(500),
        ..RouterSettings::default()
    }
}

pub fn ollama_at(server: &MockServer) -> Arc<dyn AiBackend> {
    Arc::new(
        OllamaBackend::new(OllamaConfig {
            host: server.uri(),
            ..OllamaConfig::default()
        })
        .unwrap(),
    )
}

pub fn openai_at(server: &MockServer) -> Arc<dyn AiBackend> {
    Arc::new(
        OpenAiBackend::with_key(
            OpenAiConfig {
                base_url: server.uri(),
                ..OpenAiConfig::default()
            },
            "test-key",
        )
        .unwrap(),
    )
}

pub fn ollama_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "phi3:mini",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

pub fn openai_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

/// End-to-end harness around one server instance.
pub struct TestHarness {
    pub state: AppState,
    pub router: Router,
}

impl TestHarness {
    pub fn new(pipeline: PipelineConfig, providers: ProviderRouter) -> Self {
        let state = AppState::new(pipeline, providers);
        let router = build_router(state.clone());
        Self { state, router }
    }

    /// Harness with a single scripted provider answering `reply`.
    pub fn scripted(reply: &str) -> Self {
        let providers = ProviderRouter::builder(RouterSettings::default())
            .provider("scripted", 1, Arc::new(ScriptedBackend::replying(reply)))
            .build();
        Self::new(PipelineConfig::default(), providers)
    }

    /// POST /api/v1/commands in the default session.
    pub async fn send(&self, text: &str) -> (StatusCode, serde_json::Value) {
        self.post_command(serde_json::json!({ "text": text })).await
    }

    /// POST /api/v1/commands in `session`.
    pub async fn send_in(&self, session: &str, text: &str) -> (StatusCode, serde_json::Value) {
        self.post_command(serde_json::json!({ "text": text, "session_id": session }))
            .await
    }

    async fn post_command(&self, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::post("/api/v1/commands")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.call(request).await
    }

    pub async fn get(&self, url: &str) -> (StatusCode, serde_json::Value) {
        self.call(Request::get(url).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, url: &str) -> StatusCode {
        let response = self
            .router
            .clone()
            .oneshot(Request::delete(url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
