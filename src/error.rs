//! Error types for media-dl
//!
//! Two layers of errors live here:
//! - [`EngineError`] — failures of the external fetch engine, which are
//!   never surfaced synchronously over HTTP; the job runner converts them
//!   into terminal job state instead.
//! - [`Error`] — everything the API layer can answer a request with,
//!   mapped to HTTP status codes. The `Display` strings of the request
//!   errors are the exact wire-format bodies the API promises
//!   (`{"error": "not found"}` and friends).

use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Submission without a usable `url` field
    #[error("missing url")]
    MissingUrl,

    /// Unknown job id
    #[error("not found")]
    NotFound,

    /// The job exists but has produced no output file yet
    #[error("no file for job")]
    NoFileForJob,

    /// The recorded output file is gone from the storage root
    #[error("file missing")]
    FileMissing,

    /// Neither an in-memory log nor a durable log artifact exists
    #[error("no log available")]
    NoLogAvailable,

    /// The durable log artifact exists but could not be read
    #[error("cannot read log file")]
    LogReadFailed(#[source] std::io::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServer(String),

    /// Fetch engine failure
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Failures of the external fetch engine invocation
///
/// `Unavailable` covers the engine being structurally absent from the
/// execution environment (binary not installed or misconfigured), which
/// moves a job directly from `queued` to `error`. `Failed` covers any
/// failure during the invocation itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine binary is not present or not usable
    #[error("fetch engine unavailable: {0}")]
    Unavailable(String),

    /// The engine started but the invocation failed
    #[error("{0}")]
    Failed(String),
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - client input error
            Error::MissingUrl => 400,

            // 404 Not Found - unknown job or sub-resource not yet available
            Error::NotFound
            | Error::NoFileForJob
            | Error::FileMissing
            | Error::NoLogAvailable => 404,

            // 500 Internal Server Error
            Error::LogReadFailed(_)
            | Error::Io(_)
            | Error::ApiServer(_)
            | Error::Engine(_) => 500,
        }
    }
}
