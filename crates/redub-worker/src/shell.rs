//! Subprocess-backed capability implementations: yt-dlp for fetching,
//! vot-cli for voice-over translation, ffmpeg/ffprobe for mixing and
//! muxing. Tests substitute fakes; these are the production seams.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use redub_bus::{EventBus, LogLevel};
use redub_entity::job::options::FormatPreset;
use redub_entity::job::payload::{DownloadParams, DubParams, MuxParams};
use redub_queue::WorkerError;

use crate::capability::{
    FetchedMedia, SourceMetadata, TrackMuxer, VideoFetcher, VoiceDubber, is_retryable_message,
};

/// Media file extensions considered download outputs.
const MEDIA_EXTENSIONS: [&str; 5] = ["mkv", "mp4", "webm", "mp3", "m4a"];

/// ISO 639-2 codes for audio track metadata.
fn lang_code(lang: &str) -> &str {
    match lang {
        "ru" => "rus",
        "en" => "eng",
        "es" => "spa",
        "de" => "deu",
        "fr" => "fra",
        "it" => "ita",
        "pt" => "por",
        "ja" => "jpn",
        "ko" => "kor",
        "zh" => "zho",
        other => other,
    }
}

/// Run a command, returning stdout on success and a classified worker
/// error (by stderr pattern) on failure.
async fn run_tool(code: &str, mut command: Command) -> Result<String, WorkerError> {
    let output = command
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| WorkerError::permanent(code, format!("failed to spawn: {e}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let message: String = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
        Err(WorkerError {
            code: code.to_string(),
            retryable: is_retryable_message(&message),
            message,
        })
    }
}

/// yt-dlp subprocess fetcher.
#[derive(Debug, Default)]
pub struct YtDlpFetcher;

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        params: &DownloadParams,
        events: &EventBus,
    ) -> Result<FetchedMedia, WorkerError> {
        tokio::fs::create_dir_all(&params.temp_dir)
            .await
            .map_err(|e| WorkerError::permanent("DOWNLOAD_ERROR", e.to_string()))?;

        // Probe metadata first, as the original extract-then-download flow.
        let mut probe = Command::new("yt-dlp");
        probe.arg("-J").arg("--no-warnings").arg(&params.url);
        let info: serde_json::Value = serde_json::from_str(
            &run_tool("DOWNLOAD_ERROR", probe).await?,
        )
        .map_err(|e| WorkerError::permanent("DOWNLOAD_ERROR", format!("bad yt-dlp JSON: {e}")))?;

        let metadata = SourceMetadata {
            source_id: info["id"].as_str().map(str::to_owned),
            source_title: info["title"].as_str().map(str::to_owned),
            source_uploader: info["uploader"]
                .as_str()
                .or_else(|| info["channel"].as_str())
                .map(str::to_owned),
            source_upload_date: info["upload_date"].as_str().map(str::to_owned),
            source_description: info["description"].as_str().map(str::to_owned),
            source_thumbnail_url: info["thumbnail"].as_str().map(str::to_owned),
            duration_sec: info["duration"].as_f64(),
            width: info["width"].as_i64(),
            height: info["height"].as_i64(),
            fps: info["fps"].as_f64(),
            video_codec: info["vcodec"].as_str().map(str::to_owned),
            audio_codec: info["acodec"].as_str().map(str::to_owned),
        };

        let mut download = Command::new("yt-dlp");
        download
            .arg("-o")
            .arg(params.temp_dir.join("%(id)s.%(ext)s"))
            .arg("--merge-output-format")
            .arg(params.output_container.as_str())
            .arg("--socket-timeout")
            .arg("30")
            .arg("--retries")
            .arg("10");
        // "bestvideo+bestaudio" relies on the tool's own default selection.
        if params.format_preset != FormatPreset::BestVideoAudio {
            download.arg("-f").arg(params.format_preset.as_str());
        }
        if params.download_subtitles {
            download.arg("--write-subs").arg("--sub-langs").arg("en,ru,all");
        }
        if let Some(proxy) = &params.proxy {
            download.arg("--proxy").arg(proxy);
        }
        if let Some(rate) = &params.rate_limit {
            download.arg("--limit-rate").arg(rate);
        }
        if let Some(cookies) = &params.cookies_file {
            if cookies.is_file() {
                download.arg("--cookies").arg(cookies);
            }
        }
        download.arg(&params.url);

        events.publish_log(params.job_id, LogLevel::Info, "Running yt-dlp");
        run_tool("DOWNLOAD_ERROR", download).await?;

        let video_path = find_output_file(&params.temp_dir, metadata.source_id.as_deref())
            .await
            .ok_or_else(|| {
                WorkerError::permanent("DOWNLOAD_ERROR", "downloaded file not found")
            })?;

        debug!(path = %video_path.display(), "yt-dlp output located");
        Ok(FetchedMedia {
            video_path,
            metadata,
        })
    }
}

/// Locate the downloaded file: prefer a name containing the source id,
/// fall back to any media file in the temp directory.
async fn find_output_file(temp_dir: &Path, source_id: Option<&str>) -> Option<PathBuf> {
    let mut fallback = None;
    let mut entries = tokio::fs::read_dir(temp_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name()?.to_string_lossy().into_owned();
        if let Some(id) = source_id {
            if name.contains(id) {
                return Some(path);
            }
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if MEDIA_EXTENSIONS.contains(&ext.as_str()) && fallback.is_none() {
            fallback = Some(path);
        }
    }
    fallback
}

/// vot-cli subprocess dubber.
#[derive(Debug, Default)]
pub struct VotCliDubber;

#[async_trait]
impl VoiceDubber for VotCliDubber {
    async fn dub(&self, params: &DubParams, events: &EventBus) -> Result<PathBuf, WorkerError> {
        tokio::fs::create_dir_all(&params.temp_dir)
            .await
            .map_err(|e| WorkerError::permanent("DUB_ERROR", e.to_string()))?;

        let mut command = Command::new("vot-cli");
        command
            .arg("--output")
            .arg(&params.temp_dir)
            .arg("--output-file")
            .arg(
                params
                    .output_path
                    .file_name()
                    .unwrap_or_else(|| "dubbed.wav".as_ref()),
            )
            .arg("--reslang")
            .arg(&params.target_lang);
        if params.use_lively_voice {
            command.arg("--lively");
        }
        command.arg(&params.url);

        events.publish_log(params.job_id, LogLevel::Info, "Running vot-cli");
        run_tool("DUB_ERROR", command).await?;

        if params.output_path.is_file() {
            Ok(params.output_path.clone())
        } else {
            Err(WorkerError::permanent(
                "DUB_ERROR",
                "translation produced no audio file",
            ))
        }
    }
}

/// ffmpeg/ffprobe subprocess muxer.
#[derive(Debug, Default)]
pub struct FfmpegMuxer;

impl FfmpegMuxer {
    /// Check the video carries at least one audio stream.
    async fn has_audio_stream(&self, video: &Path) -> Result<bool, WorkerError> {
        let mut probe = Command::new("ffprobe");
        probe
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg("-select_streams")
            .arg("a")
            .arg(video);
        let parsed: serde_json::Value = serde_json::from_str(&run_tool("MUX_ERROR", probe).await?)
            .map_err(|e| WorkerError::permanent("MUX_ERROR", format!("bad ffprobe JSON: {e}")))?;
        Ok(parsed["streams"]
            .as_array()
            .is_some_and(|streams| !streams.is_empty()))
    }

    /// Extract the original audio as 48 kHz stereo PCM.
    async fn extract_audio(&self, video: &Path, out: &Path) -> Result<(), WorkerError> {
        let mut command = Command::new("ffmpeg");
        command
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-vn")
            .arg("-ac")
            .arg("2")
            .arg("-ar")
            .arg("48000")
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg(out);
        run_tool("MUX_ERROR", command).await.map(drop)
    }

    /// Duck the original under the normalized dubbed track.
    async fn mix_with_ducking(
        &self,
        original: &Path,
        dubbed: &Path,
        out: &Path,
        ducking_level: f64,
        normalization_lufs: f64,
    ) -> Result<(), WorkerError> {
        let filter = format!(
            "[0:a]volume={ducking_level}[orig];\
             [1:a]loudnorm=I={normalization_lufs},volume=1.0[dub];\
             [orig][dub]amix=inputs=2:duration=longest:normalize=0[out]"
        );
        let mut command = Command::new("ffmpeg");
        command
            .arg("-y")
            .arg("-i")
            .arg(original)
            .arg("-i")
            .arg(dubbed)
            .arg("-filter_complex")
            .arg(&filter)
            .arg("-map")
            .arg("[out]")
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg(out);
        run_tool("MUX_ERROR", command).await.map(drop)
    }

    /// Mux video + original + mixed track, dubbed track default.
    async fn mux_tracks(
        &self,
        video: &Path,
        original: &Path,
        mixed: &Path,
        out: &Path,
        target_lang: &str,
    ) -> Result<(), WorkerError> {
        let mut command = Command::new("ffmpeg");
        command
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(original)
            .arg("-i")
            .arg(mixed)
            .arg("-map")
            .arg("0:v")
            .arg("-map")
            .arg("1:a")
            .arg("-map")
            .arg("2:a")
            .arg("-c:v")
            .arg("copy")
            .arg("-c:a:0")
            .arg("aac")
            .arg("-c:a:1")
            .arg("aac")
            .arg("-b:a:0")
            .arg("192k")
            .arg("-b:a:1")
            .arg("192k")
            .arg("-metadata:s:a:0")
            .arg("language=und")
            .arg("-metadata:s:a:0")
            .arg("title=Original")
            .arg("-metadata:s:a:1")
            .arg(format!("language={}", lang_code(target_lang)))
            .arg("-metadata:s:a:1")
            .arg("title=Dubbed")
            .arg("-disposition:a:0")
            .arg("0")
            .arg("-disposition:a:1")
            .arg("default")
            .arg(out);
        run_tool("MUX_ERROR", command).await.map(drop)
    }

    /// Remux into the requested container without re-encoding (no-dub path).
    async fn remux(&self, video: &Path, out: &Path) -> Result<(), WorkerError> {
        let mut command = Command::new("ffmpeg");
        command
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-c")
            .arg("copy")
            .arg(out);
        run_tool("MUX_ERROR", command).await.map(drop)
    }
}

#[async_trait]
impl TrackMuxer for FfmpegMuxer {
    async fn mux(&self, params: &MuxParams, events: &EventBus) -> Result<PathBuf, WorkerError> {
        tokio::fs::create_dir_all(&params.temp_dir)
            .await
            .map_err(|e| WorkerError::permanent("MUX_ERROR", e.to_string()))?;
        let temp_output = params
            .temp_dir
            .join(format!("output.{}", params.output_container.as_str()));

        let Some(dubbed) = &params.audio_dubbed_path else {
            events.publish_log(params.job_id, LogLevel::Info, "Remuxing without dubbing");
            self.remux(&params.video_path, &temp_output).await?;
            return Ok(temp_output);
        };

        if !self.has_audio_stream(&params.video_path).await? {
            return Err(WorkerError::permanent(
                "MUX_ERROR",
                format!(
                    "video file has no audio stream: {}",
                    params.video_path.display()
                ),
            ));
        }

        events.publish_log(params.job_id, LogLevel::Info, "Extracting original audio");
        let original_audio = params.temp_dir.join("original_audio.wav");
        self.extract_audio(&params.video_path, &original_audio).await?;

        events.publish_log(params.job_id, LogLevel::Info, "Mixing audio with ducking");
        let mixed_audio = params.temp_dir.join("mixed_audio.wav");
        self.mix_with_ducking(
            &original_audio,
            dubbed,
            &mixed_audio,
            params.ducking_level,
            params.normalization_lufs,
        )
        .await?;

        events.publish_log(params.job_id, LogLevel::Info, "Muxing audio tracks into video");
        self.mux_tracks(
            &params.video_path,
            &original_audio,
            &mixed_audio,
            &temp_output,
            &params.target_lang,
        )
        .await?;

        Ok(temp_output)
    }
}
