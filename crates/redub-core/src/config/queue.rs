//! Queue coordinator configuration.

use serde::{Deserialize, Serialize};

/// What to do with entries left `active` by a previous process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoverPolicy {
    /// Reset orphaned active entries to waiting (default).
    Redispatch,
    /// Mark orphaned active entries failed.
    Fail,
}

/// Per-queue worker parallelism and housekeeping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Download queue concurrency. The download queue is a single writer;
    /// values above 1 break its strict FIFO guarantee and are clamped.
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
    /// Dub queue concurrency (2-4).
    #[serde(default = "default_dubbing_concurrency")]
    pub dubbing_concurrency: usize,
    /// Mux queue concurrency (1-2).
    #[serde(default = "default_muxing_concurrency")]
    pub muxing_concurrency: usize,
    /// Interval between claim polls per dispatcher, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Recovery policy for orphaned active entries at startup.
    #[serde(default = "default_recover_active")]
    pub recover_active: RecoverPolicy,
    /// Completed entries are reaped after this many hours.
    #[serde(default = "default_completed_retention_hours")]
    pub completed_retention_hours: u64,
    /// Failed entries are retained this many days for dead-letter inspection.
    #[serde(default = "default_failed_retention_days")]
    pub failed_retention_days: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            download_concurrency: default_download_concurrency(),
            dubbing_concurrency: default_dubbing_concurrency(),
            muxing_concurrency: default_muxing_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            recover_active: default_recover_active(),
            completed_retention_hours: default_completed_retention_hours(),
            failed_retention_days: default_failed_retention_days(),
        }
    }
}

fn default_download_concurrency() -> usize {
    1
}

fn default_dubbing_concurrency() -> usize {
    2
}

fn default_muxing_concurrency() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_recover_active() -> RecoverPolicy {
    RecoverPolicy::Redispatch
}

fn default_completed_retention_hours() -> u64 {
    24
}

fn default_failed_retention_days() -> u64 {
    7
}
