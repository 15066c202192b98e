//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use fluxforge_comfyui::encode::DEFAULT_JPEG_QUALITY;
use fluxforge_comfyui::job::{DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// Worker configuration.
///
/// All fields have defaults suitable for a local ComfyUI instance; in
/// deployment everything is overridden via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Base URL of the ComfyUI instance.
    pub comfyui_url: String,
    /// Delay between job status polls.
    pub poll_interval: Duration,
    /// Total budget for one job to finish.
    pub job_timeout: Duration,
    /// Directories searched for workflow templates, first hit wins.
    pub workflow_dirs: Vec<PathBuf>,
    /// Model roots searched for asset-existence checks.
    pub model_dirs: Vec<PathBuf>,
    /// JPEG quality for delivered artifacts.
    pub jpeg_quality: u8,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default                          |
    /// |--------------------|----------------------------------|
    /// | `HOST`             | `0.0.0.0`                        |
    /// | `PORT`             | `8000`                           |
    /// | `COMFYUI_URL`      | `http://127.0.0.1:8188`          |
    /// | `POLL_INTERVAL_MS` | `1500`                           |
    /// | `JOB_TIMEOUT_SECS` | `600`                            |
    /// | `WORKFLOW_DIRS`    | `workflows`                      |
    /// | `MODEL_DIRS`       | `/runpod-volume/models,models`   |
    /// | `JPEG_QUALITY`     | `93`                             |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let comfyui_url =
            std::env::var("COMFYUI_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let poll_interval = std::env::var("POLL_INTERVAL_MS")
            .ok()
            .map(|v| {
                Duration::from_millis(v.parse().expect("POLL_INTERVAL_MS must be a valid u64"))
            })
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let job_timeout = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .map(|v| Duration::from_secs(v.parse().expect("JOB_TIMEOUT_SECS must be a valid u64")))
            .unwrap_or(DEFAULT_JOB_TIMEOUT);

        let workflow_dirs = parse_dirs(
            &std::env::var("WORKFLOW_DIRS").unwrap_or_else(|_| "workflows".into()),
        );
        let model_dirs = parse_dirs(
            &std::env::var("MODEL_DIRS").unwrap_or_else(|_| "/runpod-volume/models,models".into()),
        );

        let jpeg_quality: u8 = std::env::var("JPEG_QUALITY")
            .unwrap_or_else(|_| DEFAULT_JPEG_QUALITY.to_string())
            .parse()
            .expect("JPEG_QUALITY must be a valid u8");

        Self {
            host,
            port,
            comfyui_url,
            poll_interval,
            job_timeout,
            workflow_dirs,
            model_dirs,
            jpeg_quality,
        }
    }
}

/// Split a comma-separated directory list, dropping empty entries.
fn parse_dirs(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
