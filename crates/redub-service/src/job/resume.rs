//! Resume planner: decide which stage a failed job restarts at from its
//! event history and filesystem evidence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use redub_entity::event::{EventKind, JobEvent};
use redub_entity::job::model::Job;
use redub_entity::job::status::JobStatus;
use redub_entity::media::Media;

/// Stage a resumed job restarts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStage {
    /// Video exists; restart at voice-over translation.
    Dubbing,
    /// Video and dubbed audio exist; restart at muxing.
    Muxing,
}

impl ResumeStage {
    /// Lowercase name used in responses and the recorded retry event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dubbing => "dubbing",
            Self::Muxing => "muxing",
        }
    }
}

/// Evidence collected while planning; returned as diagnostic details
/// when no stage is recoverable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDiagnostics {
    pub download_completed: bool,
    pub dubbing_completed: bool,
    pub has_video: bool,
    pub has_dubbed_audio: bool,
    pub requested_dubbing: bool,
}

/// Decide the restart stage. First match wins:
///
/// 1. reached `dubbed`, video and dubbed audio exist -> resume at muxing
/// 2. reached `downloaded`, video exists, dubbing requested -> resume at dubbing
/// 3. otherwise -> not resumable (caller falls back to retry)
pub fn plan(
    job: &Job,
    history: &[JobEvent],
    media: Option<&Media>,
) -> Result<(ResumeStage, ResumeDiagnostics), ResumeDiagnostics> {
    let download_completed = reached_state(history, JobStatus::Downloaded);
    let dubbing_completed = reached_state(history, JobStatus::Dubbed);

    let has_video = media
        .and_then(|m| m.video_path.as_deref())
        .is_some_and(|p| Path::new(p).is_file());
    let has_dubbed_audio = media
        .and_then(|m| m.audio_dubbed_path.as_deref())
        .is_some_and(|p| Path::new(p).is_file());

    let diagnostics = ResumeDiagnostics {
        download_completed,
        dubbing_completed,
        has_video,
        has_dubbed_audio,
        requested_dubbing: job.requested_dubbing,
    };

    if dubbing_completed && has_video && has_dubbed_audio {
        Ok((ResumeStage::Muxing, diagnostics))
    } else if download_completed && has_video && job.requested_dubbing {
        Ok((ResumeStage::Dubbing, diagnostics))
    } else {
        Err(diagnostics)
    }
}

/// Whether the event history records a transition into `state`.
fn reached_state(history: &[JobEvent], state: JobStatus) -> bool {
    history.iter().any(|event| {
        event.kind == EventKind::StateChange
            && event.payload.0.get("to").and_then(|v| v.as_str()) == Some(state.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use redub_entity::job::options::{FormatPreset, OutputContainer};
    use sqlx::types::Json;
    use uuid::Uuid;

    fn job(requested_dubbing: bool) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::now_v7(),
            url: "https://example.test/v1".into(),
            status: JobStatus::Failed,
            priority: 0,
            retry_count: 0,
            error: Some("dub failed".into()),
            requested_dubbing,
            target_lang: "ru".into(),
            use_lively_voice: false,
            format_preset: FormatPreset::BestVideoAudio,
            output_container: OutputContainer::Mkv,
            download_subtitles: false,
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    fn state_change(job_id: Uuid, id: i64, from: JobStatus, to: JobStatus) -> JobEvent {
        JobEvent {
            id,
            job_id,
            kind: EventKind::StateChange,
            payload: Json(serde_json::json!({"from": from.as_str(), "to": to.as_str()})),
            created_at: Utc::now(),
        }
    }

    fn media_with(video: Option<&Path>, dubbed: Option<&Path>) -> Media {
        Media {
            video_path: video.map(|p| p.to_string_lossy().into_owned()),
            audio_dubbed_path: dubbed.map(|p| p.to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn resumes_at_dubbing_after_a_completed_download() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.mkv");
        std::fs::write(&video, b"x").unwrap();

        let job = job(true);
        let history = vec![
            state_change(job.id, 1, JobStatus::Queued, JobStatus::Downloading),
            state_change(job.id, 2, JobStatus::Downloading, JobStatus::Downloaded),
        ];
        let media = media_with(Some(&video), None);

        let (stage, diag) = plan(&job, &history, Some(&media)).unwrap();
        assert_eq!(stage, ResumeStage::Dubbing);
        assert!(diag.download_completed);
        assert!(!diag.dubbing_completed);
    }

    #[test]
    fn resumes_at_muxing_when_dubbed_audio_survives() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.mkv");
        let dubbed = dir.path().join("dubbed.wav");
        std::fs::write(&video, b"x").unwrap();
        std::fs::write(&dubbed, b"x").unwrap();

        let job = job(true);
        let history = vec![
            state_change(job.id, 1, JobStatus::Queued, JobStatus::Downloading),
            state_change(job.id, 2, JobStatus::Downloading, JobStatus::Downloaded),
            state_change(job.id, 3, JobStatus::Downloaded, JobStatus::Dubbing),
            state_change(job.id, 4, JobStatus::Dubbing, JobStatus::Dubbed),
        ];
        let media = media_with(Some(&video), Some(&dubbed));

        let (stage, _) = plan(&job, &history, Some(&media)).unwrap();
        assert_eq!(stage, ResumeStage::Muxing);
    }

    #[test]
    fn rejects_when_nothing_completed() {
        let job = job(true);
        let history = vec![state_change(
            job.id,
            1,
            JobStatus::Queued,
            JobStatus::Downloading,
        )];

        let diag = plan(&job, &history, None).unwrap_err();
        assert!(!diag.download_completed);
        assert!(!diag.has_video);
    }

    #[test]
    fn rejects_when_the_video_file_is_gone() {
        let job = job(true);
        let history = vec![
            state_change(job.id, 1, JobStatus::Queued, JobStatus::Downloading),
            state_change(job.id, 2, JobStatus::Downloading, JobStatus::Downloaded),
        ];
        let media = media_with(Some(Path::new("/nonexistent/v.mkv")), None);

        assert!(plan(&job, &history, Some(&media)).is_err());
    }

    #[test]
    fn rejects_without_dubbing_request_even_after_download() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.mkv");
        std::fs::write(&video, b"x").unwrap();

        let job = job(false);
        let history = vec![
            state_change(job.id, 1, JobStatus::Queued, JobStatus::Downloading),
            state_change(job.id, 2, JobStatus::Downloading, JobStatus::Downloaded),
        ];
        let media = media_with(Some(&video), None);

        assert!(plan(&job, &history, Some(&media)).is_err());
    }
}
