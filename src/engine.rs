//! Fetch engine adapter
//!
//! The engine performing the actual URL-to-file extraction is opaque to
//! the rest of the system: it is invoked with a URL and a progress
//! callback and resolves to the list of produced file paths. The
//! [`FetchEngine`] trait is that seam; [`YtDlpEngine`] is the production
//! implementation shelling out to the external `yt-dlp` binary.

use crate::config::Config;
use crate::error::EngineError;
use crate::types::ProgressEvent;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Marker prefix for machine-readable progress lines on the engine's
/// stdout. Anything else printed is a produced file path.
const PROGRESS_PREFIX: &str = "media-dl-progress:";

/// Maximum number of stderr lines carried into a failure detail
const STDERR_TAIL_LINES: usize = 5;

/// The external fetch/extraction engine, invoked once per job
///
/// The invocation is expected to block the calling thread for the
/// duration of the download; callers confine it to a blocking task.
/// Progress callbacks run synchronously on the engine's call stack.
pub trait FetchEngine: Send + Sync {
    /// Download/extract `url`, reporting progress through `on_progress`,
    /// and return the paths of the produced files
    fn invoke(
        &self,
        url: &str,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<Vec<PathBuf>, EngineError>;
}

/// Production engine shelling out to the `yt-dlp` binary
///
/// The binary is resolved from an explicit configured path or discovered
/// on PATH via the `which` crate; absence maps to
/// [`EngineError::Unavailable`]. Progress is captured through yt-dlp's
/// `--progress-template` as prefixed stdout lines, and produced file
/// paths through `--print after_move:filepath`.
pub struct YtDlpEngine {
    binary_path: Option<PathBuf>,
    download_dir: PathBuf,
    output_template: String,
}

impl YtDlpEngine {
    /// Build an engine from the server configuration
    pub fn new(config: &Config) -> Self {
        Self {
            binary_path: config.engine.binary_path.clone(),
            download_dir: config.download_dir.clone(),
            output_template: config.engine.output_template.clone(),
        }
    }

    /// Resolve the yt-dlp executable, configured path first, PATH second
    fn resolve_binary(&self) -> Result<PathBuf, EngineError> {
        if let Some(path) = &self.binary_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(EngineError::Unavailable(format!(
                "configured yt-dlp binary {} does not exist",
                path.display()
            )));
        }
        which::which("yt-dlp").map_err(|e| {
            EngineError::Unavailable(format!("yt-dlp not found in PATH: {e}"))
        })
    }

    fn progress_template() -> String {
        // Pipe-separated, filename last so it may itself contain pipes.
        format!(
            "download:{PROGRESS_PREFIX}%(progress.status)s|\
             %(progress.downloaded_bytes)s|\
             %(progress.total_bytes)s|\
             %(progress.speed)s|\
             %(progress.filename)s"
        )
    }
}

impl FetchEngine for YtDlpEngine {
    fn invoke(
        &self,
        url: &str,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<Vec<PathBuf>, EngineError> {
        let binary = self.resolve_binary()?;
        let output_template = self.download_dir.join(&self.output_template);

        let mut child = Command::new(&binary)
            .arg("--newline")
            .arg("--no-warnings")
            .arg("--quiet")
            .arg("--progress")
            .arg("--progress-template")
            .arg(Self::progress_template())
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--no-simulate")
            .arg("-o")
            .arg(&output_template)
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::Failed(format!("failed to launch yt-dlp: {e}"))
            })?;

        // Drain stderr on its own thread so a chatty engine cannot
        // deadlock against the stdout loop.
        let stderr_handle = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let mut produced = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(event) = parse_progress_line(line) {
                    on_progress(event);
                } else {
                    produced.push(PathBuf::from(line));
                }
            }
        }

        let status = child.wait().map_err(|e| {
            EngineError::Failed(format!("failed to wait for yt-dlp: {e}"))
        })?;
        let stderr = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(EngineError::Failed(format!(
                "yt-dlp exited with {status}: {}",
                stderr_tail(&stderr)
            )));
        }
        Ok(produced)
    }
}

/// Parse one prefixed progress line into an event
///
/// Line layout: `{prefix}{status}|{downloaded}|{total}|{speed}|{filename}`
/// where numeric fields may be `NA`. Unknown statuses are dropped.
fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.strip_prefix(PROGRESS_PREFIX)?;
    let mut parts = rest.splitn(5, '|');
    let status = parts.next()?;
    let downloaded_bytes = parse_u64_field(parts.next()?);
    let total_bytes = parse_u64_field(parts.next()?);
    let speed = parse_f64_field(parts.next()?);
    let filename = parts
        .next()
        .map(str::trim)
        .filter(|f| !f.is_empty() && *f != "NA")
        .map(str::to_string);

    match status {
        "downloading" => Some(ProgressEvent::Downloading {
            filename,
            downloaded_bytes,
            total_bytes,
            speed,
        }),
        "finished" => Some(ProgressEvent::Finished { filename }),
        _ => None,
    }
}

/// Numeric field: integer or float rendering, `NA` when unknown
fn parse_u64_field(field: &str) -> Option<u64> {
    field.trim().parse::<f64>().ok().map(|v| v.max(0.0) as u64)
}

fn parse_f64_field(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok()
}

/// Last few stderr lines, joined for a one-line failure detail
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return "no error output".to_string();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("; ")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloading_line_parses_all_fields() {
        let line = format!(
            "{PROGRESS_PREFIX}downloading|1048576|10485760|524288.5|/tmp/dl/My Video.mp4"
        );
        let event = parse_progress_line(&line).unwrap();
        assert_eq!(
            event,
            ProgressEvent::Downloading {
                filename: Some("/tmp/dl/My Video.mp4".to_string()),
                downloaded_bytes: Some(1_048_576),
                total_bytes: Some(10_485_760),
                speed: Some(524_288.5),
            }
        );
    }

    #[test]
    fn na_fields_parse_to_none() {
        let line = format!("{PROGRESS_PREFIX}downloading|1024|NA|NA|NA");
        let event = parse_progress_line(&line).unwrap();
        assert_eq!(
            event,
            ProgressEvent::Downloading {
                filename: None,
                downloaded_bytes: Some(1024),
                total_bytes: None,
                speed: None,
            }
        );
    }

    #[test]
    fn finished_line_parses() {
        let line = format!("{PROGRESS_PREFIX}finished|5242880|5242880|NA|/tmp/dl/clip.webm");
        let event = parse_progress_line(&line).unwrap();
        assert_eq!(
            event,
            ProgressEvent::Finished {
                filename: Some("/tmp/dl/clip.webm".to_string()),
            }
        );
    }

    #[test]
    fn filename_may_contain_the_separator() {
        let line = format!("{PROGRESS_PREFIX}finished|NA|NA|NA|/tmp/dl/a|b.mp4");
        let event = parse_progress_line(&line).unwrap();
        assert_eq!(
            event,
            ProgressEvent::Finished {
                filename: Some("/tmp/dl/a|b.mp4".to_string()),
            }
        );
    }

    #[test]
    fn unprefixed_lines_are_not_progress() {
        assert!(parse_progress_line("/tmp/dl/final.mp4").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn unknown_status_is_dropped() {
        let line = format!("{PROGRESS_PREFIX}postprocessing|NA|NA|NA|x.mp4");
        assert!(parse_progress_line(&line).is_none());
    }

    #[test]
    fn float_byte_counts_truncate() {
        assert_eq!(parse_u64_field("1536.7"), Some(1536));
        assert_eq!(parse_u64_field("NA"), None);
        assert_eq!(parse_u64_field(""), None);
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr = "one\ntwo\nthree\nfour\nfive\nsix\nseven\n";
        let tail = stderr_tail(stderr);
        assert!(!tail.contains("one"));
        assert!(!tail.contains("two"));
        assert!(tail.contains("three"));
        assert!(tail.contains("seven"));
    }

    #[test]
    fn stderr_tail_of_empty_output() {
        assert_eq!(stderr_tail("  \n \n"), "no error output");
    }

    #[test]
    fn configured_missing_binary_is_unavailable() {
        let mut config = Config::default();
        config.engine.binary_path = Some(PathBuf::from("/nonexistent/yt-dlp-xyz"));
        let engine = YtDlpEngine::new(&config);
        match engine.resolve_binary() {
            Err(EngineError::Unavailable(detail)) => {
                assert!(detail.contains("/nonexistent/yt-dlp-xyz"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn path_discovery_matches_which() {
        let engine = YtDlpEngine::new(&Config::default());
        let which_result = which::which("yt-dlp");
        let resolve_result = engine.resolve_binary();
        assert_eq!(
            which_result.is_ok(),
            resolve_result.is_ok(),
            "resolve_binary must agree with which::which on PATH discovery"
        );
    }

    #[test]
    fn invoking_with_missing_binary_never_calls_the_callback() {
        let mut config = Config::default();
        config.engine.binary_path = Some(PathBuf::from("/nonexistent/yt-dlp-xyz"));
        let engine = YtDlpEngine::new(&config);

        let mut called = false;
        let result = engine.invoke("https://example.com/video", &mut |_| called = true);
        assert!(matches!(result, Err(EngineError::Unavailable(_))));
        assert!(!called);
    }
}
