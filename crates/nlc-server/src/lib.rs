//! HTTP server for the natural-language CAD command pipeline.
//!
//! Library crate so the binary (`main.rs`) and `nlc-e2e-tests` share
//! `AppState`, `build_router`, and the in-memory document.

pub mod config;
pub mod document;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use document::InMemoryDocument;
pub use routes::build_router;
pub use state::AppState;
