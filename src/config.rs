//! Configuration types.
//!
//! Everything is env-var driven with sensible defaults; channel configs
//! live next to their channels and return `None` when the channel is not
//! configured (channel disabled, not an error).

use std::path::PathBuf;
use std::time::Duration;

/// Core monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sleep between poll cycles.
    pub poll_interval: Duration,
    /// Upper bound on messages examined per cycle.
    pub max_per_cycle: usize,
    /// Directory for the processed-id log, session record, and diagnostics.
    pub data_dir: PathBuf,
    /// Optional log file (in addition to stderr).
    pub log_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300), // 5 minutes
            max_per_cycle: 10,
            data_dir: PathBuf::from("./data"),
            log_file: None,
        }
    }
}

impl MonitorConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let poll_interval = env_parse("MONITOR_CHECK_INTERVAL_SECS", 300u64);
        let max_per_cycle = env_parse("MONITOR_MAX_PER_CYCLE", 10usize);
        let data_dir = std::env::var("MONITOR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let log_file = std::env::var("MONITOR_LOG_FILE").ok().map(PathBuf::from);

        Self {
            poll_interval: Duration::from_secs(poll_interval),
            max_per_cycle,
            data_dir,
            log_file,
        }
    }

    /// Path of the append-only processed-id log.
    pub fn processed_log_path(&self) -> PathBuf {
        self.data_dir.join("processed_messages.log")
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Read a comma-separated env var into a list, dropping empty entries.
pub(crate) fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Truthy env flag: `1`, `true`, `yes` (case-insensitive).
pub(crate) fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
