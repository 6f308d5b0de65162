//! Stage payload builders.

use std::path::{Path, PathBuf};

use redub_core::config::{DownloadConfig, MediaConfig, MuxConfig};
use redub_entity::job::model::Job;
use redub_entity::job::payload::{DownloadParams, DubParams, MuxParams};
use redub_entity::media::Media;

/// Download payload for a job's fresh (or retried) lineage.
pub fn download_params(
    job: &Job,
    media_cfg: &MediaConfig,
    download_cfg: &DownloadConfig,
) -> DownloadParams {
    let temp_dir = media_cfg.incomplete_dir(&job.id.to_string());
    let cookies_file = existing_cookies_file(&temp_dir);

    DownloadParams {
        job_id: job.id,
        url: job.url.clone(),
        format_preset: job.format_preset,
        output_container: job.output_container,
        requested_dubbing: job.requested_dubbing,
        target_lang: job.target_lang.clone(),
        use_lively_voice: job.use_lively_voice,
        download_subtitles: job.download_subtitles,
        final_path: fallback_final_path(job, media_cfg),
        temp_dir,
        cookies_file,
        proxy: download_cfg.proxy.clone(),
        rate_limit: download_cfg.rate_limit.clone(),
    }
}

/// Dub payload rebuilt from the media row (resume path).
pub fn dub_params(job: &Job, media: &Media, media_cfg: &MediaConfig) -> DubParams {
    let temp_dir = media_cfg.incomplete_dir(&job.id.to_string());
    DubParams {
        job_id: job.id,
        url: job.url.clone(),
        video_path: media
            .video_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_default(),
        target_lang: job.target_lang.clone(),
        use_lively_voice: job.use_lively_voice,
        output_path: temp_dir.join("dubbed.wav"),
        final_path: fallback_final_path(job, media_cfg),
        temp_dir,
        output_container: job.output_container,
    }
}

/// Mux payload rebuilt from the media row (resume and no-dub paths).
pub fn mux_params(job: &Job, media: &Media, media_cfg: &MediaConfig, mux_cfg: &MuxConfig) -> MuxParams {
    MuxParams {
        job_id: job.id,
        video_path: media
            .video_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_default(),
        audio_dubbed_path: media.audio_dubbed_path.as_deref().map(PathBuf::from),
        target_lang: job.target_lang.clone(),
        output_container: job.output_container,
        ducking_level: mux_cfg.ducking_level,
        normalization_lufs: mux_cfg.normalization_lufs,
        temp_dir: media_cfg.incomplete_dir(&job.id.to_string()),
        final_path: fallback_final_path(job, media_cfg),
    }
}

/// `complete/{jobId}.{container}`; workers prefer a title-based name once
/// metadata is known.
fn fallback_final_path(job: &Job, media_cfg: &MediaConfig) -> PathBuf {
    media_cfg
        .complete_dir()
        .join(format!("{}.{}", job.id, job.output_container.as_str()))
}

/// The cookies file written at creation, when it still exists.
fn existing_cookies_file(temp_dir: &Path) -> Option<PathBuf> {
    let path = temp_dir.join("cookies.txt");
    path.is_file().then_some(path)
}
