//! Delver Core - data model and foundation utilities
//!
//! This crate defines the research data model, the error taxonomy, the
//! context-window-aware text chunker, token estimation, and the concurrency
//! primitives shared by the rest of the system.

pub mod chunker;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod tokens;
pub mod types;

pub use chunker::*;
pub use concurrency::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use tokens::*;
pub use types::*;

// Re-export commonly used external crates
pub use tokio;
pub use tracing;
