//! Job service configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Job service configuration.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Directory for uploaded videos
    pub upload_dir: PathBuf,
    /// Directory for processed videos
    pub output_dir: PathBuf,
    /// Jobs older than this are removed by the retention sweep
    pub retention: Duration,
    /// Time between retention sweeps
    pub sweep_interval: Duration,
    /// Maximum pipelines running at once
    pub max_concurrent_jobs: usize,
    /// Upper bound on the final transcode
    pub transcode_timeout: Duration,
    /// Reported to clients on submission
    pub estimated_duration_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            retention: Duration::from_secs(86_400), // 24 hours
            sweep_interval: Duration::from_secs(300),
            max_concurrent_jobs: 2,
            transcode_timeout: Duration::from_secs(3600),
            estimated_duration_secs: 120,
        }
    }
}

impl JobsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            retention: Duration::from_secs(
                std::env::var("JOB_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86_400),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("RETENTION_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs: &u64| *secs > 0)
                    .unwrap_or(300),
            ),
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
            transcode_timeout: Duration::from_secs(
                std::env::var("TRANSCODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            estimated_duration_secs: std::env::var("ESTIMATED_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.estimated_duration_secs),
        }
    }

    /// Config rooted in `base`, for tests and local runs.
    pub fn in_dir(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            upload_dir: base.join("uploads"),
            output_dir: base.join("outputs"),
            ..Self::default()
        }
    }
}
