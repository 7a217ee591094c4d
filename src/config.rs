//! Configuration types for media-dl

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Main configuration for the download job server
///
/// All fields have sensible defaults so the server works out of the box:
/// downloads land in `./downloads`, per-job log artifacts in `./logs`, and
/// the API listens on port 5000.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Output storage root, a flat directory shared by all jobs
    /// (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory for per-job durable log artifacts (default: "./logs")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// HTTP API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Fetch engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            log_dir: default_log_dir(),
            api: ApiConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Create the download and log directories if they do not exist
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.download_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

/// HTTP API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the API server to (default: "0.0.0.0:5000")
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser clients (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; "*" allows any origin (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Fetch engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit path to the yt-dlp executable (auto-detected from PATH if
    /// None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Output filename template, relative to the download directory
    /// (default: "%(title)s.%(ext)s")
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Trailing modification-time window in seconds for the fallback
    /// output scan when the engine reports no file list (default: 120)
    #[serde(default = "default_recent_window_secs")]
    pub recent_window_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            output_template: default_output_template(),
            recent_window_secs: default_recent_window_secs(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

fn default_recent_window_secs() -> u64 {
    120
}
