//! Job creation defaults and worker pass-through options.

use serde::{Deserialize, Serialize};

/// Defaults applied to job creation requests that omit options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefaults {
    /// Default dubbing target language.
    #[serde(default = "default_target_lang")]
    pub default_target_lang: String,
    /// Default output container.
    #[serde(default = "default_container")]
    pub default_container: String,
    /// Default yt-dlp format preset.
    #[serde(default = "default_format_preset")]
    pub default_format_preset: String,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            default_target_lang: default_target_lang(),
            default_container: default_container(),
            default_format_preset: default_format_preset(),
        }
    }
}

/// Mux-stage audio mixing defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Attenuation applied to the original track while the dub plays (0-1).
    #[serde(default = "default_ducking_level")]
    pub ducking_level: f64,
    /// Loudness target for the dubbed track prior to mixing.
    #[serde(default = "default_normalization_lufs")]
    pub normalization_lufs: f64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            ducking_level: default_ducking_level(),
            normalization_lufs: default_normalization_lufs(),
        }
    }
}

/// Optional download pass-through settings applied to every download job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Proxy URL handed to the fetcher.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Download rate limit, e.g. `"50K"` or `"10M"`.
    #[serde(default)]
    pub rate_limit: Option<String>,
}

fn default_target_lang() -> String {
    "ru".to_string()
}

fn default_container() -> String {
    "mkv".to_string()
}

fn default_format_preset() -> String {
    "bestvideo+bestaudio".to_string()
}

fn default_ducking_level() -> f64 {
    0.3
}

fn default_normalization_lufs() -> f64 {
    -16.0
}
