//! Typed stage payloads carried on the queues.
//!
//! Each queue has exactly one payload shape; entries store the payload as
//! JSON and the stage worker deserializes it back at dispatch time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::options::{FormatPreset, OutputContainer};

/// Payload for the download queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    /// Job this payload belongs to.
    pub job_id: Uuid,
    /// Source video URL.
    pub url: String,
    /// Fetcher format preset.
    pub format_preset: FormatPreset,
    /// Output container format.
    pub output_container: OutputContainer,
    /// Whether dubbing follows the download.
    pub requested_dubbing: bool,
    /// Dubbing target language.
    pub target_lang: String,
    /// Use the "lively" voice variant.
    pub use_lively_voice: bool,
    /// Also fetch subtitles.
    pub download_subtitles: bool,
    /// Work-in-progress directory for this job.
    pub temp_dir: PathBuf,
    /// Fallback final output path (`complete/{jobId}.{container}`).
    pub final_path: PathBuf,
    /// Netscape cookies file, when the creation request carried cookies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<PathBuf>,
    /// Proxy URL pass-through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Rate limit pass-through, e.g. `"50K"` or `"10M"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
}

/// Payload for the dub queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DubParams {
    /// Job this payload belongs to.
    pub job_id: Uuid,
    /// Original source URL, required by the translation service.
    pub url: String,
    /// Downloaded video file.
    pub video_path: PathBuf,
    /// Dubbing target language.
    pub target_lang: String,
    /// Use the "lively" voice variant.
    pub use_lively_voice: bool,
    /// Work-in-progress directory for this job.
    pub temp_dir: PathBuf,
    /// Where the dubbed audio track is written (`{tempDir}/dubbed.wav`).
    pub output_path: PathBuf,
    /// Final output path handed through to the mux stage.
    pub final_path: PathBuf,
    /// Output container handed through to the mux stage.
    pub output_container: OutputContainer,
}

/// Payload for the mux queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuxParams {
    /// Job this payload belongs to.
    pub job_id: Uuid,
    /// Downloaded video file.
    pub video_path: PathBuf,
    /// Dubbed audio track; absent for jobs without dubbing, which are
    /// remuxed into the requested container as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_dubbed_path: Option<PathBuf>,
    /// Dubbing target language (audio track metadata).
    pub target_lang: String,
    /// Output container format.
    pub output_container: OutputContainer,
    /// Attenuation applied to the original track while the dub plays (0-1).
    pub ducking_level: f64,
    /// Loudness target for the dubbed track prior to mixing.
    pub normalization_lufs: f64,
    /// Work-in-progress directory for this job.
    pub temp_dir: PathBuf,
    /// Final output path.
    pub final_path: PathBuf,
}
