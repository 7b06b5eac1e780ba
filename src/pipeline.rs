//! Request orchestration: text in, narrated video out.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

use crate::artifacts::{ArtifactPaths, RequestId};
use crate::config::AppConfig;
use crate::error::PipelineResult;
use crate::giphy::{download_clips, search_clips, ClipSource, GiphyClient};
use crate::keywords::extract_keywords;
use crate::reconcile::{Compositor, FfmpegCompositor};
use crate::tts::{PiperSynthesizer, SpeechSynthesizer};

/// A finished render.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoOutput {
    pub request_id: RequestId,
    pub video_path: PathBuf,
    /// The narrated text, returned unchanged.
    pub transcript: String,
}

impl VideoOutput {
    pub fn file_name(&self) -> String {
        self.video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

pub struct Pipeline {
    config: AppConfig,
    clips: Arc<dyn ClipSource>,
    speech: Arc<dyn SpeechSynthesizer>,
    compositor: Arc<dyn Compositor>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        clips: Arc<dyn ClipSource>,
        speech: Arc<dyn SpeechSynthesizer>,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        Self {
            config,
            clips,
            speech,
            compositor,
        }
    }

    /// Wire up Giphy, Piper and ffmpeg from configuration.
    pub fn from_config(config: AppConfig) -> PipelineResult<Self> {
        let giphy = GiphyClient::new(
            config.http_client()?,
            config.giphy_base_url.clone(),
            config.giphy_key()?,
        );
        let piper = PiperSynthesizer::new(config.piper_bin.clone(), config.piper_model.clone());
        let ffmpeg = FfmpegCompositor::new(config.clip_seconds, config.fps);
        Ok(Self::new(
            config,
            Arc::new(giphy),
            Arc::new(piper),
            Arc::new(ffmpeg),
        ))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run every stage for `summary_text`. Any stage failure is logged and
    /// yields `None`.
    pub async fn run(&self, summary_text: &str) -> Option<VideoOutput> {
        let request_id = RequestId::generate();
        let span = info_span!("render", request_id = %request_id);
        self.run_with_id(summary_text, request_id).instrument(span).await
    }

    pub async fn run_with_id(&self, summary_text: &str, request_id: RequestId) -> Option<VideoOutput> {
        if summary_text.trim().is_empty() {
            error!("No summary text to render");
            return None;
        }
        if let Err(e) = self.config.ensure_dirs() {
            error!("Could not create output directories: {}", e);
            return None;
        }

        let paths = ArtifactPaths::new(&self.config, request_id);
        info!("Summary: {:.200}", summary_text.replace('\n', " "));

        let keywords = extract_keywords(summary_text, self.config.max_keywords);
        let mut urls = search_clips(self.clips.as_ref(), &keywords).await;
        if urls.is_empty() {
            error!("Failed to find any GIFs");
            return None;
        }
        urls.truncate(self.config.max_clips);

        let local_clips = download_clips(self.clips.as_ref(), &urls, &paths).await;
        if local_clips.is_empty() {
            error!("Failed to download GIFs");
            return None;
        }
        info!("Using {} of {} clips", local_clips.len(), urls.len());

        let audio = match self.speech.synthesize(summary_text, &paths.audio).await {
            Ok(path) if path.exists() => path,
            Ok(path) => {
                error!("Failed to generate audio: {} is missing", path.display());
                return None;
            }
            Err(e) => {
                error!("Failed to generate audio: {}", e);
                return None;
            }
        };

        match self.compositor.compose(&local_clips, &audio, &paths.video).await {
            Ok(video) if video.exists() => {
                info!("Video with audio created successfully: {}", video.display());
                Some(VideoOutput {
                    request_id: paths.request_id.clone(),
                    video_path: video,
                    transcript: summary_text.to_string(),
                })
            }
            Ok(video) => {
                error!("Failed to create the video with audio: {} is missing", video.display());
                None
            }
            Err(e) => {
                error!("Failed to create the video with audio: {}", e);
                None
            }
        }
    }
}
