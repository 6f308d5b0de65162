//! Capability traits for the external collaborators each stage invokes.
//!
//! The yt-dlp subprocess, the voice-over translation HTTP client, and the
//! FFmpeg mixing command live behind these seams; the workers own event
//! publication, stage chaining and the file lifecycle around them.

use async_trait::async_trait;
use std::path::PathBuf;

use redub_bus::EventBus;
use redub_entity::job::payload::{DownloadParams, DubParams, MuxParams};
use redub_queue::WorkerError;

/// Source-side metadata extracted during the fetch.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    pub source_id: Option<String>,
    pub source_title: Option<String>,
    pub source_uploader: Option<String>,
    pub source_upload_date: Option<String>,
    pub source_description: Option<String>,
    pub source_thumbnail_url: Option<String>,
    pub duration_sec: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// Downloaded file inside the job's temp directory.
    pub video_path: PathBuf,
    /// Extracted metadata.
    pub metadata: SourceMetadata,
}

/// Video download capability (yt-dlp contract).
#[async_trait]
pub trait VideoFetcher: Send + Sync + std::fmt::Debug {
    /// Download the video into `params.temp_dir`, publishing progress and
    /// log events for the job as the transfer advances.
    async fn fetch(
        &self,
        params: &DownloadParams,
        events: &EventBus,
    ) -> Result<FetchedMedia, WorkerError>;
}

/// Voice-over translation capability (VOT contract).
#[async_trait]
pub trait VoiceDubber: Send + Sync + std::fmt::Debug {
    /// Produce a dubbed audio track at `params.output_path`.
    async fn dub(&self, params: &DubParams, events: &EventBus) -> Result<PathBuf, WorkerError>;
}

/// Audio mixing and muxing capability (FFmpeg contract).
#[async_trait]
pub trait TrackMuxer: Send + Sync + std::fmt::Debug {
    /// Mix and mux into a temp output inside `params.temp_dir`; the worker
    /// moves the result into place.
    async fn mux(&self, params: &MuxParams, events: &EventBus) -> Result<PathBuf, WorkerError>;
}

/// Classify an error message as transient by pattern, mirroring the
/// network/timeout/rate-limit classes the queue retries.
pub fn is_retryable_message(error: &str) -> bool {
    const RETRYABLE_PATTERNS: [&str; 9] = [
        "network",
        "timeout",
        "connection",
        "temporary",
        "unavailable",
        "rate limit",
        "429",
        "503",
        "502",
    ];
    let lower = error.to_lowercase();
    RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Parse a rate limit string such as `"50K"` or `"1M"` into bytes/second.
pub fn parse_rate_limit(rate_limit: &str) -> Option<u64> {
    let trimmed = rate_limit.trim().to_uppercase();
    if trimmed.is_empty() {
        return None;
    }

    for (suffix, multiplier) in [("K", 1024u64), ("M", 1024 * 1024), ("G", 1024 * 1024 * 1024)] {
        if let Some(value) = trimmed.strip_suffix(suffix) {
            return value
                .parse::<f64>()
                .ok()
                .map(|v| (v * multiplier as f64) as u64);
        }
    }

    trimmed.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(is_retryable_message("HTTP Error 503: Service Unavailable"));
        assert!(is_retryable_message("Connection reset by peer"));
        assert!(is_retryable_message("Rate limit exceeded"));
        assert!(!is_retryable_message("Unsupported URL"));
        assert!(!is_retryable_message("This video is private"));
    }

    #[test]
    fn rate_limit_parsing() {
        assert_eq!(parse_rate_limit("50K"), Some(50 * 1024));
        assert_eq!(parse_rate_limit("1M"), Some(1024 * 1024));
        assert_eq!(parse_rate_limit("2.5m"), Some((2.5 * 1024.0 * 1024.0) as u64));
        assert_eq!(parse_rate_limit("4096"), Some(4096));
        assert_eq!(parse_rate_limit("fast"), None);
    }
}
