//! Request identifiers and the per-request artifact layout.

use std::fmt;
use std::path::PathBuf;

use crate::config::AppConfig;

/// Short random token embedded in every file a request writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// First 8 hex characters of a random v4 UUID.
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where one request's clips, audio and final video are written.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub request_id: RequestId,
    gifs_dir: PathBuf,
    pub audio: PathBuf,
    pub video: PathBuf,
}

impl ArtifactPaths {
    pub fn new(config: &AppConfig, request_id: RequestId) -> Self {
        let audio = config
            .audios_dir()
            .join(format!("audio_{}.wav", request_id));
        let video = config
            .videos_dir()
            .join(format!("video_{}.mp4", request_id));
        Self {
            gifs_dir: config.gifs_dir(),
            request_id,
            audio,
            video,
        }
    }

    /// Path of the `index`-th downloaded clip.
    pub fn clip(&self, index: usize) -> PathBuf {
        self.gifs_dir
            .join(format!("gif_{}_{}.gif", self.request_id, index))
    }
}
