//! Job status enumeration and the legal transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for the download queue.
    Queued,
    /// Download worker is fetching the video.
    Downloading,
    /// Video fetched; next stage not yet dispatched.
    Downloaded,
    /// Voice-over translation in progress.
    Dubbing,
    /// Dubbed audio produced.
    Dubbed,
    /// Audio mixing and container muxing in progress.
    Muxing,
    /// Final output written to the complete directory.
    Complete,
    /// Terminal failure; `error` carries the last message.
    Failed,
    /// Canceled by the user.
    Canceled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Canceled)
    }

    /// Whether `self -> to` is a legal transition.
    ///
    /// Terminal states have no outgoing edges; retry/resume exit them by
    /// starting a new queue lineage, not by a recorded transition.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        match self {
            Queued => matches!(to, Downloading | Canceled | Failed),
            Downloading => matches!(to, Downloaded | Failed | Canceled),
            Downloaded => matches!(to, Dubbing | Muxing | Failed | Canceled),
            Dubbing => matches!(to, Dubbed | Failed | Canceled),
            Dubbed => matches!(to, Muxing | Failed | Canceled),
            Muxing => matches!(to, Complete | Failed | Canceled),
            Complete | Failed | Canceled => false,
        }
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Dubbing => "dubbing",
            Self::Dubbed => "dubbed",
            Self::Muxing => "muxing",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Parse a lowercase status string.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "queued" => Self::Queued,
            "downloading" => Self::Downloading,
            "downloaded" => Self::Downloaded,
            "dubbing" => Self::Dubbing,
            "dubbed" => Self::Dubbed,
            "muxing" => Self::Muxing,
            "complete" => Self::Complete,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            _ => return None,
        })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::JobStatus::*;

    const ALL: [super::JobStatus; 9] = [
        Queued, Downloading, Downloaded, Dubbing, Dubbed, Muxing, Complete, Failed, Canceled,
    ];

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [Complete, Failed, Canceled] {
            for to in ALL {
                assert!(!from.can_transition(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn every_non_terminal_state_can_fail_and_cancel() {
        for from in [Queued, Downloading, Downloaded, Dubbing, Dubbed, Muxing] {
            assert!(from.can_transition(Failed));
            assert!(from.can_transition(Canceled));
        }
    }

    #[test]
    fn dubbing_is_skippable_only_from_downloaded() {
        assert!(Downloaded.can_transition(Muxing));
        assert!(Downloaded.can_transition(Dubbing));
        assert!(!Downloading.can_transition(Muxing));
        assert!(!Dubbing.can_transition(Muxing));
        assert!(Dubbed.can_transition(Muxing));
    }

    #[test]
    fn parse_round_trips() {
        for status in ALL {
            assert_eq!(super::JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(super::JobStatus::parse("paused"), None);
    }
}
