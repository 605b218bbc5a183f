//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use subflow_media::TranscriberConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory holding per-job input and output artifacts
    pub work_dir: PathBuf,
    /// Bounded cadence for progress flushes and cancel checks
    pub flush_interval: Duration,
    /// Number of audio samples taken for subtitle synchronization
    pub sync_sample_count: usize,
    /// Length of each audio sample in seconds
    pub sync_sample_secs: f64,
    /// Minimum per-sample offsets required to trust a sync result
    pub sync_min_offsets: usize,
    /// Matching window between transcript cues and subtitle cues, in ms
    pub sync_match_window_ms: i64,
    /// Transcriber invocation settings
    pub transcriber: TranscriberConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/subflow"),
            flush_interval: Duration::from_secs(2),
            sync_sample_count: 5,
            sync_sample_secs: 45.0,
            sync_min_offsets: 3,
            sync_match_window_ms: 5_000,
            transcriber: TranscriberConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            flush_interval: std::env::var("FLUSH_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.flush_interval),
            sync_sample_count: std::env::var("SYNC_SAMPLE_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sync_sample_count),
            sync_sample_secs: std::env::var("SYNC_SAMPLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sync_sample_secs),
            sync_min_offsets: defaults.sync_min_offsets,
            sync_match_window_ms: defaults.sync_match_window_ms,
            transcriber: TranscriberConfig::from_env(),
        }
    }

    /// Directory for one job's artifacts.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }
}
