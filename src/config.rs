//! Process-wide configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

/// Everything the pipeline and the HTTP server need, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Giphy API key. Only required once a render is attempted.
    pub giphy_api_key: Option<String>,
    pub giphy_base_url: String,
    /// OpenAI key, used by PDF summarization only.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_chat_model: String,
    pub openai_embedding_model: String,
    /// Root directory holding the `gifs`, `audios` and `videos` subdirectories.
    pub output_dir: PathBuf,
    pub piper_bin: String,
    pub piper_model: PathBuf,
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` means any.
    pub cors_origins: Vec<String>,
    pub http_timeout: Duration,
    pub max_keywords: usize,
    pub max_clips: usize,
    /// Length every clip is normalized to before concatenation.
    pub clip_seconds: f64,
    pub fps: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            giphy_api_key: None,
            giphy_base_url: "https://api.giphy.com".to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com".to_string(),
            openai_chat_model: "gpt-4o-mini".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            output_dir: PathBuf::from("./public"),
            piper_bin: "piper".to_string(),
            piper_model: PathBuf::from("./tts/en_US-amy-medium.onnx"),
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            http_timeout: Duration::from_secs(30),
            max_keywords: 10,
            max_clips: 6,
            clip_seconds: 5.0,
            fps: 24,
        }
    }
}

impl AppConfig {
    /// Build the config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            giphy_api_key: non_empty_var("GIPHY_API_KEY"),
            giphy_base_url: env::var("GIPHY_BASE_URL").unwrap_or(defaults.giphy_base_url),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_chat_model: env::var("OPENAI_CHAT_MODEL").unwrap_or(defaults.openai_chat_model),
            openai_embedding_model: env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or(defaults.openai_embedding_model),
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            piper_bin: env::var("PIPER_BIN").unwrap_or(defaults.piper_bin),
            piper_model: env::var("PIPER_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.piper_model),
            host: env::var("API_HOST").unwrap_or(defaults.host),
            port: parsed_var("API_PORT").unwrap_or(defaults.port),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            http_timeout: parsed_var("HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            max_keywords: parsed_var("MAX_KEYWORDS").unwrap_or(defaults.max_keywords),
            max_clips: parsed_var("MAX_CLIPS").unwrap_or(defaults.max_clips),
            clip_seconds: parsed_var("CLIP_SECONDS")
                .filter(|s: &f64| *s > 0.0)
                .unwrap_or(defaults.clip_seconds),
            fps: parsed_var("OUTPUT_FPS")
                .filter(|f: &u32| *f > 0)
                .unwrap_or(defaults.fps),
        }
    }

    pub fn gifs_dir(&self) -> PathBuf {
        self.output_dir.join("gifs")
    }

    pub fn audios_dir(&self) -> PathBuf {
        self.output_dir.join("audios")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.output_dir.join("videos")
    }

    /// Create the three artifact directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.gifs_dir(), self.audios_dir(), self.videos_dir()] {
            std::fs::create_dir_all(&dir)?;
            tracing::debug!("Ensured directory exists: {}", dir.display());
        }
        Ok(())
    }

    pub fn giphy_key(&self) -> PipelineResult<&str> {
        self.giphy_api_key
            .as_deref()
            .ok_or(PipelineError::MissingConfig("GIPHY_API_KEY"))
    }

    pub fn openai_key(&self) -> PipelineResult<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or(PipelineError::MissingConfig("OPENAI_API_KEY"))
    }

    /// Build a shared HTTP client honoring the configured timeout.
    pub fn http_client(&self) -> PipelineResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("textreel/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }

    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
