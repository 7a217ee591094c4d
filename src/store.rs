//! In-memory job store, the single source of truth for job state
//!
//! Concurrent-safe mapping from [`JobId`] to job record. Membership lives
//! behind an outer `RwLock`; each job carries its own inner `RwLock` so a
//! job's runner task and arbitrarily many API reads synchronize per job,
//! and independent jobs never serialize against each other.
//!
//! Every log append is mirrored best-effort to a per-job artifact
//! (`{log_dir}/{job_id}.log`). The in-memory state stays authoritative: a
//! failed mirror write is reported through `tracing` and swallowed.

use crate::types::{Job, JobId, JobStatus, Progress};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Concurrent-safe create/read/update store keyed by job id
///
/// Jobs are never evicted; they remain queryable for the life of the
/// process. An eviction/expiry policy is a documented extension point, not
/// part of this design.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<RwLock<Job>>>>,
    log_dir: PathBuf,
}

impl JobStore {
    /// Create a store that mirrors job logs into `log_dir`
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            log_dir: log_dir.into(),
        }
    }

    /// Insert a new job in the `queued` state
    ///
    /// # Panics
    ///
    /// Panics if `id` already exists — ids are allocated fresh at
    /// submission, so a collision is a programming error.
    pub fn create(&self, id: JobId, url: &str) {
        let mut jobs = self
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = jobs.insert(id, Arc::new(RwLock::new(Job::new(id, url))));
        assert!(previous.is_none(), "job id {id} already exists");
    }

    /// Return a snapshot copy of the job, or None if unknown
    ///
    /// The clone means readers never hold a lock while serializing the
    /// response and never observe a partially-applied update.
    pub fn snapshot(&self, id: JobId) -> Option<Job> {
        let job = self.job(id)?;
        let guard = job.read().unwrap_or_else(PoisonError::into_inner);
        Some(guard.clone())
    }

    /// Whether the store knows this job id
    pub fn contains(&self, id: JobId) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Path of the durable log artifact for a job
    pub fn log_path(&self, id: JobId) -> PathBuf {
        self.log_dir.join(format!("{id}.log"))
    }

    /// Append a timestamped entry to the job's log
    ///
    /// The entry is pushed to the in-memory log, mirrored best-effort to
    /// the durable artifact, and emitted on the tracing channel.
    pub fn append_log(&self, id: JobId, message: &str) {
        let entry = format!(
            "[{}] {message}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let Some(job) = self.job(id) else { return };
        {
            let mut guard = job.write().unwrap_or_else(PoisonError::into_inner);
            guard.log.push(entry.clone());
        }
        self.mirror_to_disk(id, &entry);
        tracing::info!(job_id = %id, "{message}");
    }

    /// Overwrite progress and move the job to `downloading`
    ///
    /// Ignored once the job is terminal.
    pub fn set_downloading(&self, id: JobId, progress: Progress) {
        self.update(id, |job| {
            if job.status.is_terminal() {
                return;
            }
            job.status = JobStatus::Downloading;
            job.progress = Some(progress);
        });
    }

    /// Record one output filename reported by a progress hook
    pub fn record_file(&self, id: JobId, name: &str) {
        self.update(id, |job| {
            job.files.push(name.to_string());
        });
    }

    /// Replace the job's file list with the post-processed one
    ///
    /// An empty list is ignored: `files`, once non-empty, is never
    /// cleared.
    pub fn set_files(&self, id: JobId, files: Vec<String>) {
        if files.is_empty() {
            return;
        }
        self.update(id, |job| {
            job.files = files;
        });
    }

    /// Move the job to the terminal `finished` state
    ///
    /// Clears the progress snapshot (present only while downloading).
    /// Ignored once the job is terminal.
    pub fn finish(&self, id: JobId) {
        self.update(id, |job| {
            if job.status.is_terminal() {
                return;
            }
            job.status = JobStatus::Finished;
            job.progress = None;
        });
    }

    /// Move the job to the terminal `error` state with a failure detail
    ///
    /// Ignored once the job is terminal.
    pub fn fail(&self, id: JobId, detail: &str) {
        self.update(id, |job| {
            if job.status.is_terminal() {
                return;
            }
            job.status = JobStatus::Error;
            job.error = Some(detail.to_string());
            job.progress = None;
        });
    }

    fn job(&self, id: JobId) -> Option<Arc<RwLock<Job>>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Apply a mutation under the job's own lock
    fn update(&self, id: JobId, mutation: impl FnOnce(&mut Job)) {
        let Some(job) = self.job(id) else { return };
        let mut guard = job.write().unwrap_or_else(PoisonError::into_inner);
        mutation(&mut guard);
    }

    /// Best-effort append of a log entry to the durable artifact
    ///
    /// Must never fail the in-memory update: any error is reported and
    /// discarded.
    fn mirror_to_disk(&self, id: JobId, entry: &str) {
        let path = self.log_path(id);
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{entry}"));
        if let Err(e) = result {
            tracing::warn!(
                job_id = %id,
                path = %path.display(),
                error = %e,
                "failed to append to durable job log"
            );
        }
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("JobStore")
            .field("jobs", &count)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}
