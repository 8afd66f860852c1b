//! nlc-server: natural-language CAD commands over HTTP.
//!
//! Usage: `nlc-server [CONFIG_PATH]` (default `/etc/nlc/server.toml`).

use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use nlc_server::config::DEFAULT_CONFIG_PATH;
use nlc_server::{AppState, ServerConfig, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nlc-server starting");

    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = ServerConfig::load(&path)?;
    tracing::info!(
        config = %path.display(),
        classifier = ?config.pipeline.classifier,
        providers = config.providers.entries.len(),
        "configuration loaded"
    );

    let state = AppState::from_config(&config).await;
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
