//! FFprobe media information.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{PipelineError, PipelineResult};

/// What the reconciler needs to know about a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    /// Container duration in seconds, 0.0 when unknown.
    pub duration: f64,
    /// Width of the first video stream, 0 when there is none.
    pub width: u32,
    pub height: u32,
    pub has_video: bool,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a media file with `ffprobe`.
pub async fn probe_media(path: impl AsRef<Path>) -> PipelineResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| PipelineError::ToolNotFound("ffprobe"))?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(PipelineError::FfprobeFailed(format!(
            "{}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_ffprobe_json(&output.stdout)
}

fn parse_ffprobe_json(raw: &[u8]) -> PipelineResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(raw)?;

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    // Some containers (GIF in particular) only report duration per stream.
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds)
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref().and_then(parse_seconds))
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        has_video: video.is_some(),
        has_audio,
    })
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0)
}
