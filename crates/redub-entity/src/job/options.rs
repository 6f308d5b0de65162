//! Download format and container enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format preset handed to the video fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum FormatPreset {
    /// Best video + best audio, merged (fetcher default handling).
    #[serde(rename = "bestvideo+bestaudio")]
    #[sqlx(rename = "bestvideo+bestaudio")]
    BestVideoAudio,
    /// Best single file.
    #[serde(rename = "best")]
    #[sqlx(rename = "best")]
    Best,
    /// Audio only.
    #[serde(rename = "bestaudio")]
    #[sqlx(rename = "bestaudio")]
    BestAudio,
    /// Lowest quality (debugging).
    #[serde(rename = "worst")]
    #[sqlx(rename = "worst")]
    Worst,
}

impl FormatPreset {
    /// Return the preset as the fetcher-facing string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestVideoAudio => "bestvideo+bestaudio",
            Self::Best => "best",
            Self::BestAudio => "bestaudio",
            Self::Worst => "worst",
        }
    }

    /// Parse a preset string.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "bestvideo+bestaudio" => Self::BestVideoAudio,
            "best" => Self::Best,
            "bestaudio" => Self::BestAudio,
            "worst" => Self::Worst,
            _ => return None,
        })
    }
}

impl fmt::Display for FormatPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutputContainer {
    /// Matroska.
    Mkv,
    /// MPEG-4.
    Mp4,
    /// WebM.
    Webm,
}

impl OutputContainer {
    /// Return the container as a file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mkv => "mkv",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    /// Parse a container string.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "mkv" => Self::Mkv,
            "mp4" => Self::Mp4,
            "webm" => Self::Webm,
            _ => return None,
        })
    }
}

impl fmt::Display for OutputContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
