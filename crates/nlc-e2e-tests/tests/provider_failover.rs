//! E2E tests for generative commands against wiremock provider servers.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{TestHarness, fast_settings, ollama_at, ollama_reply, openai_at, openai_reply};
use nlc_pipeline::{ClassifierKind, PipelineConfig};
use nlc_providers::ProviderRouter;

async fn ollama_answering(content: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply(content)))
        .mount(&server)
        .await;
    server
}

async fn ollama_failing(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(status).set_body_string("unavailable"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn e2e_failover_to_second_provider() {
    let primary = ollama_failing(500).await;
    let secondary = ollama_answering("The scene is empty.").await;

    let providers = ProviderRouter::builder(fast_settings())
        .provider("primary", 1, ollama_at(&primary))
        .provider("secondary", 2, ollama_at(&secondary))
        .build();
    let h = TestHarness::new(PipelineConfig::default(), providers);

    let (status, json) = h.send("analyze the scene").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true, "{json}");
    assert_eq!(json["message"], "The scene is empty.");
    assert_eq!(json["provider"], "secondary");
    let attempts = json["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0]["provider"], "primary");
    assert_eq!(attempts[0]["outcome"], "status");
    assert_eq!(attempts[1]["outcome"], "success");

    let (_, providers) = h.get("/api/v1/providers").await;
    assert_eq!(providers[0]["id"], "primary");
    assert_eq!(providers[0]["health"], "unhealthy");
    assert_eq!(providers[0]["in_cooldown"], true);
    assert_eq!(providers[1]["health"], "healthy");
}

#[tokio::test]
async fn e2e_provider_in_cooldown_is_skipped() {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&primary)
        .await;
    let secondary = ollama_answering("ok").await;

    let providers = ProviderRouter::builder(fast_settings())
        .provider("primary", 1, ollama_at(&primary))
        .provider("secondary", 2, ollama_at(&secondary))
        .build();
    let h = TestHarness::new(PipelineConfig::default(), providers);

    let (_, first) = h.send("what is a fillet").await;
    assert!(first.get("skipped").is_none(), "{first}");
    let (_, json) = h.send("what is a chamfer").await;
    assert_eq!(json["provider"], "secondary");
    assert_eq!(json["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(json["skipped"], serde_json::json!(["primary"]));
}

#[tokio::test]
async fn e2e_slow_provider_times_out() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ollama_reply("too late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;
    let fast = ollama_answering("in time").await;

    let providers = ProviderRouter::builder(fast_settings())
        .provider("slow", 1, ollama_at(&slow))
        .provider("fast", 2, ollama_at(&fast))
        .build();
    let h = TestHarness::new(PipelineConfig::default(), providers);

    let (_, json) = h.send("how do I shell a solid").await;
    assert_eq!(json["message"], "in time");
    assert_eq!(json["attempts"][0]["outcome"], "timeout");
}

#[tokio::test]
async fn e2e_all_providers_down() {
    let a = ollama_failing(500).await;
    let b = ollama_failing(502).await;

    let providers = ProviderRouter::builder(fast_settings())
        .provider("a", 1, ollama_at(&a))
        .provider("b", 2, ollama_at(&b))
        .build();
    let h = TestHarness::new(PipelineConfig::default(), providers);

    let (status, json) = h.send("explain lofting").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["errorKind"], "AllProvidersExhausted");
    let order: Vec<&str> = json["attempts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["provider"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["a", "b"]);
}

#[tokio::test]
async fn e2e_repeated_question_hits_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply("Use a sweep.")))
        .expect(1)
        .mount(&server)
        .await;

    let providers = ProviderRouter::builder(fast_settings())
        .provider("local", 1, ollama_at(&server))
        .build();
    let h = TestHarness::new(PipelineConfig::default(), providers);

    let (_, first) = h.send("how do I follow a path").await;
    // A command in between changes the scene and the recent history.
    h.send("create a sphere with radius 1").await;
    let (_, second) = h.send("How do I follow a path").await;
    assert_eq!(first["message"], second["message"]);
    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
}

#[tokio::test]
async fn e2e_tiered_classifier_falls_back_to_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("You classify commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
            r#"{"intent": "AnalyzeScene", "confidence": 0.9}"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(openai_reply("Nothing here yet.")),
        )
        .mount(&server)
        .await;

    let providers = ProviderRouter::builder(fast_settings())
        .provider("cloud", 1, openai_at(&server))
        .build();
    let pipeline = PipelineConfig {
        classifier: ClassifierKind::Tiered,
        ..PipelineConfig::default()
    };
    let h = TestHarness::new(pipeline, providers);

    let (_, json) = h.send("give me a rundown of what's here").await;
    assert_eq!(json["success"], true, "{json}");
    assert_eq!(json["intent"], "AnalyzeScene");
    assert_eq!(json["message"], "Nothing here yet.");

    // Keyword hits never reach the model.
    let (_, json) = h.send("create a sphere with radius 1").await;
    assert_eq!(json["intent"], "CreateSphere");
    let classify_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains("You classify commands"))
        .count();
    assert_eq!(classify_calls, 1);
}
