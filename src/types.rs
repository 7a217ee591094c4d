//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a download job
///
/// Generated at submission time and used as the sole external handle for
/// polling status, log, and result file. Never reassigned for the lifetime
/// of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Allocate a fresh random job id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job status
///
/// Transitions are monotonic: `Queued -> Downloading -> Finished/Error`,
/// or `Queued -> Finished/Error` directly. `Finished` and `Error` are
/// terminal; no job ever moves out of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, no engine work started yet
    Queued,
    /// The fetch engine has reported download progress
    Downloading,
    /// Extraction completed successfully
    Finished,
    /// Extraction failed or the engine was unavailable
    Error,
}

impl JobStatus {
    /// Whether this status permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time download progress snapshot
///
/// Overwritten on each engine callback, never accumulated. Present on a
/// job only while it is in the `downloading` state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Progress {
    /// Bytes downloaded so far, when the engine reports them
    pub downloaded_bytes: Option<u64>,
    /// Total size in bytes (exact or estimated), when known
    pub total_bytes: Option<u64>,
    /// Current download speed in bytes per second, when known
    pub speed: Option<f64>,
}

/// One tracked asynchronous download request
///
/// Created at submission, mutated exclusively by the task driving its
/// engine invocation, queryable for the life of the process. Cloned out of
/// the store as a snapshot for API reads.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,
    /// The submitted source URL, immutable after creation
    pub url: String,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Latest progress snapshot, present only while downloading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Output filenames relative to the download directory, in the order
    /// the engine reported them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Human-readable failure detail, present only when status is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Append-only timestamped log entries
    #[serde(default)]
    pub log: Vec<String>,
    /// Submission time
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in the `queued` state with an empty log
    pub fn new(id: JobId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            status: JobStatus::Queued,
            progress: None,
            files: Vec::new(),
            error: None,
            log: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Status-tagged progress callback payload from the fetch engine
///
/// Mirrors the dictionaries the engine's progress hook emits: a
/// `downloading` event carries byte counts and speed, a `finished` event
/// names a produced file. Callbacks execute synchronously on the engine's
/// own call stack within the job's task.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Partial download progress
    Downloading {
        /// File currently being written, when the engine reports it
        filename: Option<String>,
        /// Bytes downloaded so far
        downloaded_bytes: Option<u64>,
        /// Total size in bytes (exact or estimated)
        total_bytes: Option<u64>,
        /// Download speed in bytes per second
        speed: Option<f64>,
    },
    /// One produced file completed
    Finished {
        /// Path of the completed file, when the engine reports it
        filename: Option<String>,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_round_trips_through_string() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn job_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn job_ids_are_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Downloading).unwrap(),
            "\"downloading\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Downloading.is_terminal());
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn new_job_starts_queued_and_empty() {
        let job = Job::new(JobId::new(), "https://example.com/video");
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.progress.is_none());
        assert!(job.files.is_empty());
        assert!(job.error.is_none());
        assert!(job.log.is_empty());
    }

    #[test]
    fn job_snapshot_omits_empty_optional_fields() {
        let job = Job::new(JobId::new(), "https://example.com/video");
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("progress").is_none());
        assert!(value.get("files").is_none());
        assert!(value.get("error").is_none());
        assert_eq!(value["status"], "queued");
    }
}
