//! # media-dl
//!
//! Backend library for an asynchronous media download job server.
//!
//! Submit a URL and get back a job id immediately; an external fetch
//! engine (yt-dlp) runs in a background task while clients poll the
//! job's status, log, and resulting file over the REST API.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Fire-and-forget** - Submission returns at once, work happens in the background
//! - **Snapshot-based** - Every read is a consistent point-in-time copy, no polling locks
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, api};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     config.ensure_directories()?;
//!
//!     // Serves POST /download, GET /status, /file, /log until stopped
//!     api::start_api_server(config).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// External fetch engine invocation
pub mod engine;
/// Error types
pub mod error;
/// Background job execution
pub mod runner;
/// Filename sanitization
pub mod sanitize;
/// In-memory job store
pub mod store;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, EngineConfig};
pub use engine::{FetchEngine, YtDlpEngine};
pub use error::{EngineError, Error, Result, ToHttpStatus};
pub use runner::JobRunner;
pub use sanitize::{sanitize, sanitize_basename};
pub use store::JobStore;
pub use types::{Job, JobId, JobStatus, Progress, ProgressEvent};
