//! Error types for the video pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while turning text into a narrated video.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("No clips to compose")]
    NoClips,

    #[error("Cannot plan reconciliation: {0}")]
    InvalidPlan(String),

    #[error("Invalid media duration {seconds} for {path}")]
    InvalidDuration { path: PathBuf, seconds: f64 },

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {0}")]
    FfprobeFailed(String),

    #[error("TTS engine failed: {0}")]
    TtsFailed(String),

    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn tts_failed(message: impl Into<String>) -> Self {
        Self::TtsFailed(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}
