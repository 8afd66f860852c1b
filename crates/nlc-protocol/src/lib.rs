//! Shared types for the natural-language command pipeline.
//!
//! Everything that crosses a crate boundary (or leaves the process as JSON)
//! lives here: intents, typed parameter values, conversation turns, the
//! scene snapshot, pipeline results, and provider diagnostics.

pub mod context;
pub mod intent;
pub mod params;
pub mod provider;
pub mod result;
pub mod text;

pub use context::*;
pub use intent::*;
pub use params::*;
pub use provider::*;
pub use result::*;
pub use text::normalize;
