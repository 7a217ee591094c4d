//! Job runner: one fire-and-forget task per submitted job
//!
//! The runner owns a job task's lifetime: it spawns the task, drives the
//! fetch engine to completion or failure, translates progress callbacks
//! into store updates, and performs post-processing (filename
//! sanitization, on-disk rename, output resolution). Tasks are
//! fire-and-forget: no cancellation, no join, no timeout. Everything that
//! happens inside a task is caught at the task boundary and converted
//! into job state; nothing terminates the process.

use crate::config::Config;
use crate::engine::{FetchEngine, YtDlpEngine};
use crate::error::EngineError;
use crate::sanitize;
use crate::store::JobStore;
use crate::types::{JobId, Progress, ProgressEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// Spawns and drives one concurrent task per submitted job
pub struct JobRunner {
    store: Arc<JobStore>,
    engine: Arc<dyn FetchEngine>,
    config: Arc<Config>,
}

impl JobRunner {
    /// Create a runner backed by the production yt-dlp engine
    pub fn new(store: Arc<JobStore>, config: Arc<Config>) -> Self {
        let engine = Arc::new(YtDlpEngine::new(&config));
        Self::with_engine(store, engine, config)
    }

    /// Create a runner with an injected engine (tests, embedding)
    pub fn with_engine(
        store: Arc<JobStore>,
        engine: Arc<dyn FetchEngine>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    /// Spawn the task that runs `url`'s extraction for job `id`
    ///
    /// Returns immediately; the handle is informational and never joined
    /// by the submission path. The blocking engine invocation is confined
    /// to a blocking task so it cannot stall the HTTP path or other jobs.
    pub fn spawn(&self, id: JobId, url: String) -> JoinHandle<()> {
        let store = self.store.clone();
        let engine = self.engine.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let blocking_store = store.clone();
            let result = tokio::task::spawn_blocking(move || {
                run_job(&blocking_store, engine.as_ref(), &config, id, &url);
            })
            .await;
            if let Err(e) = result {
                // A panicked engine or post-processing step still becomes
                // terminal job state rather than escaping the task.
                tracing::error!(job_id = %id, error = %e, "job task aborted");
                store.append_log(id, &format!("internal task failure: {e}"));
                store.fail(id, "internal task failure");
            }
        })
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner").finish_non_exhaustive()
    }
}

/// Drive one job from `queued` to a terminal state
///
/// Runs on a blocking thread; progress callbacks from the engine execute
/// synchronously here.
fn run_job(store: &JobStore, engine: &dyn FetchEngine, config: &Config, id: JobId, url: &str) {
    store.append_log(id, &format!("Starting download for URL: {url}"));

    let mut on_progress = |event: ProgressEvent| match event {
        ProgressEvent::Downloading {
            filename,
            downloaded_bytes,
            total_bytes,
            speed,
        } => {
            store.set_downloading(
                id,
                Progress {
                    downloaded_bytes,
                    total_bytes,
                    speed,
                },
            );
            store.append_log(
                id,
                &format_downloading_entry(
                    filename.as_deref(),
                    downloaded_bytes,
                    total_bytes,
                    speed,
                ),
            );
        }
        ProgressEvent::Finished { filename } => {
            let name = filename.as_deref().unwrap_or("");
            store.append_log(id, &format!("finished: {name}"));
            if let Some(basename) = basename_of(name) {
                store.record_file(id, basename);
            }
        }
    };

    match engine.invoke(url, &mut on_progress) {
        Ok(produced) => {
            let files = post_process(store, id, &produced);
            if !files.is_empty() {
                // The rename step takes precedence over hook-recorded
                // filenames.
                store.set_files(id, files);
            }
            store.append_log(id, "fetch engine finished extraction");
            store.finish(id);

            let recorded = store
                .snapshot(id)
                .map(|job| job.files)
                .unwrap_or_default();
            let final_files = if recorded.is_empty() {
                // The engine exposed no output list; fall back to scanning
                // the storage root for recently modified files. Known
                // heuristic: concurrent jobs can match each other's output.
                let scanned = scan_recent_outputs(
                    &config.download_dir,
                    config.engine.recent_window_secs,
                );
                store.set_files(id, scanned.clone());
                scanned
            } else {
                recorded
            };
            store.append_log(id, &format!("Job {id} finished, files: {final_files:?}"));
        }
        Err(EngineError::Unavailable(detail)) => {
            store.append_log(
                id,
                &format!("fetch engine unavailable: {detail}; ensure yt-dlp is installed"),
            );
            store.fail(id, &detail);
        }
        Err(EngineError::Failed(detail)) => {
            store.append_log(id, &format!("Exception during extraction: {detail}"));
            store.fail(id, &detail);
        }
    }
}

/// Sanitize and rename every produced file, returning the final basenames
///
/// Rename failures are recoverable: the original basename is kept and the
/// failure logged. Paths the engine reported but that are absent from
/// disk are logged and skipped.
fn post_process(store: &JobStore, id: JobId, produced: &[PathBuf]) -> Vec<String> {
    let mut files = Vec::new();
    for path in produced {
        if !path.exists() {
            store.append_log(
                id,
                &format!("File not found after download: {}", path.display()),
            );
            continue;
        }
        let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let sanitized = sanitize::sanitize_basename(basename);
        if sanitized == basename {
            files.push(basename.to_string());
            continue;
        }
        let target = path.with_file_name(&sanitized);
        match std::fs::rename(path, &target) {
            Ok(()) => {
                store.append_log(id, &format!("Renamed: {basename} -> {sanitized}"));
                files.push(sanitized);
            }
            Err(e) => {
                store.append_log(id, &format!("Error renaming {basename}: {e}"));
                files.push(basename.to_string());
            }
        }
    }
    files
}

/// Basenames of files in `dir` modified within the trailing window
fn scan_recent_outputs(dir: &Path, window_secs: u64) -> Vec<String> {
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(window_secs))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if modified >= cutoff {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    names
}

fn format_downloading_entry(
    filename: Option<&str>,
    downloaded_bytes: Option<u64>,
    total_bytes: Option<u64>,
    speed: Option<f64>,
) -> String {
    let percent = match (downloaded_bytes, total_bytes) {
        (Some(d), Some(t)) if t > 0 => Some(d as f64 / t as f64 * 100.0),
        _ => None,
    };
    format!(
        "downloading: {}{} downloaded={} speed={}",
        filename.unwrap_or(""),
        percent
            .map(|p| format!(" {p:.1}%"))
            .unwrap_or_default(),
        downloaded_bytes
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        speed
            .map(|s| format!("{s:.0}"))
            .unwrap_or_else(|| "unknown".to_string()),
    )
}

fn basename_of(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Path::new(path).file_name().and_then(|n| n.to_str())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Outcome of a scripted invocation
    enum Outcome {
        Produce(Vec<PathBuf>),
        Unavailable(String),
        Fail(String),
    }

    /// Deterministic engine replaying a fixed event script
    struct ScriptedEngine {
        events: Vec<ProgressEvent>,
        outcome: Mutex<Option<Outcome>>,
    }

    impl ScriptedEngine {
        fn new(events: Vec<ProgressEvent>, outcome: Outcome) -> Self {
            Self {
                events,
                outcome: Mutex::new(Some(outcome)),
            }
        }
    }

    impl FetchEngine for ScriptedEngine {
        fn invoke(
            &self,
            _url: &str,
            on_progress: &mut dyn FnMut(ProgressEvent),
        ) -> Result<Vec<PathBuf>, EngineError> {
            for event in &self.events {
                on_progress(event.clone());
            }
            match self.outcome.lock().unwrap().take() {
                Some(Outcome::Produce(paths)) => Ok(paths),
                Some(Outcome::Unavailable(detail)) => {
                    Err(EngineError::Unavailable(detail))
                }
                Some(Outcome::Fail(detail)) => Err(EngineError::Failed(detail)),
                None => panic!("scripted engine invoked twice"),
            }
        }
    }

    struct Fixture {
        store: Arc<JobStore>,
        config: Config,
        _temp: TempDir,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let config = Config {
            download_dir: temp.path().join("downloads"),
            log_dir: temp.path().join("logs"),
            ..Config::default()
        };
        config.ensure_directories().unwrap();
        let store = Arc::new(JobStore::new(&config.log_dir));
        Fixture {
            store,
            config,
            _temp: temp,
        }
    }

    fn downloading(downloaded: u64, total: u64) -> ProgressEvent {
        ProgressEvent::Downloading {
            filename: Some("part.mp4".to_string()),
            downloaded_bytes: Some(downloaded),
            total_bytes: Some(total),
            speed: Some(1000.0),
        }
    }

    #[test]
    fn successful_run_renames_and_finishes() {
        let fx = fixture();
        let raw = fx.config.download_dir.join("My Video (1080p)!.mp4");
        std::fs::write(&raw, b"video bytes").unwrap();

        let engine = ScriptedEngine::new(
            vec![
                downloading(10, 100),
                downloading(100, 100),
                ProgressEvent::Finished {
                    filename: Some(raw.to_string_lossy().into_owned()),
                },
            ],
            Outcome::Produce(vec![raw.clone()]),
        );

        let id = JobId::new();
        fx.store.create(id, "https://example.com/v");
        run_job(&fx.store, &engine, &fx.config, id, "https://example.com/v");

        let job = fx.store.snapshot(id).unwrap();
        assert_eq!(job.status, JobStatus::Finished);
        assert_eq!(job.files, vec!["My_Video_1080p.mp4".to_string()]);
        assert!(job.progress.is_none());
        assert!(job.error.is_none());

        // Renamed on disk, original gone
        assert!(fx.config.download_dir.join("My_Video_1080p.mp4").is_file());
        assert!(!raw.exists());

        // Lifecycle log entries in order
        let log = job.log.join("\n");
        assert!(log.contains("Starting download for URL"));
        assert!(log.contains("downloading: part.mp4 10.0%"));
        assert!(log.contains("Renamed: My Video (1080p)!.mp4 -> My_Video_1080p.mp4"));
        assert!(log.contains("finished, files"));
    }

    #[test]
    fn already_safe_name_is_not_renamed() {
        let fx = fixture();
        let path = fx.config.download_dir.join("clip.webm");
        std::fs::write(&path, b"x").unwrap();

        let engine = ScriptedEngine::new(vec![], Outcome::Produce(vec![path.clone()]));
        let id = JobId::new();
        fx.store.create(id, "u");
        run_job(&fx.store, &engine, &fx.config, id, "u");

        let job = fx.store.snapshot(id).unwrap();
        assert_eq!(job.files, vec!["clip.webm".to_string()]);
        assert!(path.is_file());
        assert!(!job.log.iter().any(|e| e.contains("Renamed:")));
    }

    #[test]
    fn rename_precedence_over_hook_recorded_names() {
        let fx = fixture();
        let raw = fx.config.download_dir.join("raw name.mp4");
        std::fs::write(&raw, b"x").unwrap();

        // Hook records the unsanitized basename; post-processing must win.
        let engine = ScriptedEngine::new(
            vec![ProgressEvent::Finished {
                filename: Some(raw.to_string_lossy().into_owned()),
            }],
            Outcome::Produce(vec![raw]),
        );
        let id = JobId::new();
        fx.store.create(id, "u");
        run_job(&fx.store, &engine, &fx.config, id, "u");

        let job = fx.store.snapshot(id).unwrap();
        assert_eq!(job.files, vec!["raw_name.mp4".to_string()]);
    }

    #[test]
    fn missing_reported_file_is_logged_and_skipped() {
        let fx = fixture();
        let ghost = fx.config.download_dir.join("never written.mp4");

        let engine = ScriptedEngine::new(vec![], Outcome::Produce(vec![ghost]));
        let id = JobId::new();
        fx.store.create(id, "u");
        run_job(&fx.store, &engine, &fx.config, id, "u");

        let job = fx.store.snapshot(id).unwrap();
        assert_eq!(job.status, JobStatus::Finished);
        assert!(
            job.log
                .iter()
                .any(|e| e.contains("File not found after download")),
        );
    }

    #[test]
    fn empty_report_falls_back_to_recent_scan() {
        let fx = fixture();
        std::fs::write(fx.config.download_dir.join("fresh.mp4"), b"x").unwrap();
        std::fs::create_dir(fx.config.download_dir.join("subdir")).unwrap();

        let engine = ScriptedEngine::new(vec![], Outcome::Produce(vec![]));
        let id = JobId::new();
        fx.store.create(id, "u");
        run_job(&fx.store, &engine, &fx.config, id, "u");

        let job = fx.store.snapshot(id).unwrap();
        assert_eq!(job.status, JobStatus::Finished);
        assert_eq!(
            job.files,
            vec!["fresh.mp4".to_string()],
            "directories are not output files"
        );
    }

    #[test]
    fn engine_failure_becomes_terminal_error_with_log() {
        let fx = fixture();
        let engine = ScriptedEngine::new(
            vec![downloading(10, 100)],
            Outcome::Fail("network reset mid-download".to_string()),
        );
        let id = JobId::new();
        fx.store.create(id, "u");
        run_job(&fx.store, &engine, &fx.config, id, "u");

        let job = fx.store.snapshot(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("network reset mid-download"));
        assert!(job.progress.is_none());
        assert!(
            job.log
                .iter()
                .any(|e| e.contains("network reset mid-download")),
        );
    }

    #[test]
    fn unavailable_engine_goes_straight_from_queued_to_error() {
        let fx = fixture();
        let engine = ScriptedEngine::new(
            vec![],
            Outcome::Unavailable("yt-dlp not found in PATH".to_string()),
        );
        let id = JobId::new();
        fx.store.create(id, "u");
        run_job(&fx.store, &engine, &fx.config, id, "u");

        let job = fx.store.snapshot(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error.as_deref().unwrap().contains("yt-dlp"));
        // Never entered downloading
        assert!(!job.log.iter().any(|e| e.contains("downloading:")));
    }

    #[tokio::test]
    async fn spawn_is_fire_and_forget() {
        let fx = fixture();
        let path = fx.config.download_dir.join("out.mp4");
        std::fs::write(&path, b"x").unwrap();

        let engine: Arc<dyn FetchEngine> = Arc::new(ScriptedEngine::new(
            vec![],
            Outcome::Produce(vec![path]),
        ));
        let runner = JobRunner::with_engine(
            fx.store.clone(),
            engine,
            Arc::new(fx.config.clone()),
        );

        let id = JobId::new();
        fx.store.create(id, "u");
        let handle = runner.spawn(id, "u".to_string());

        // The submitter would not join; the test does, for determinism.
        handle.await.unwrap();
        assert_eq!(fx.store.snapshot(id).unwrap().status, JobStatus::Finished);
    }

    #[test]
    fn scan_ignores_old_files() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("ancient.mp4");
        std::fs::write(&old, b"x").unwrap();
        let stale =
            SystemTime::now() - Duration::from_secs(600);
        let file = std::fs::File::open(&old).unwrap();
        file.set_modified(stale).unwrap();

        let names = scan_recent_outputs(temp.path(), 120);
        assert!(names.is_empty(), "files older than the window are excluded");
    }

    #[test]
    fn downloading_entry_formatting() {
        let entry =
            format_downloading_entry(Some("a.mp4"), Some(50), Some(200), Some(1234.0));
        assert_eq!(entry, "downloading: a.mp4 25.0% downloaded=50 speed=1234");

        let entry = format_downloading_entry(None, None, None, None);
        assert_eq!(entry, "downloading:  downloaded=unknown speed=unknown");
    }
}
