//! In-process stand-ins for the external collaborators, shared by tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};
use crate::giphy::ClipSource;
use crate::reconcile::Compositor;
use crate::tts::SpeechSynthesizer;

/// Serves one URL per keyword except those listed in `misses`.
#[derive(Default)]
pub(crate) struct FakeClips {
    pub(crate) misses: Vec<&'static str>,
    pub(crate) broken_downloads: Vec<usize>,
    pub(crate) searches: AtomicUsize,
    pub(crate) downloads: Mutex<Vec<String>>,
}

#[async_trait]
impl ClipSource for FakeClips {
    async fn search(&self, keyword: &str) -> PipelineResult<Option<String>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.misses.iter().any(|m| *m == keyword) {
            return Ok(None);
        }
        Ok(Some(format!("https://gifs.test/{}.gif", keyword)))
    }

    async fn download(&self, url: &str, dest: &Path) -> PipelineResult<PathBuf> {
        let n = {
            let mut seen = self.downloads.lock().unwrap();
            seen.push(url.to_string());
            seen.len() - 1
        };
        if self.broken_downloads.contains(&n) {
            return Err(PipelineError::upstream("404"));
        }
        std::fs::write(dest, b"GIF89a")?;
        Ok(dest.to_path_buf())
    }
}

#[derive(Default)]
pub(crate) struct FakeSpeech {
    pub(crate) calls: AtomicUsize,
    pub(crate) fail: bool,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, out: &Path) -> PipelineResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::tts_failed("engine crashed"));
        }
        std::fs::write(out, text)?;
        Ok(out.to_path_buf())
    }
}

#[derive(Default)]
pub(crate) struct FakeCompositor {
    pub(crate) seen: Mutex<Vec<PathBuf>>,
    pub(crate) fail: bool,
    /// Time spent "encoding" before the output is written.
    pub(crate) delay: Duration,
    pub(crate) active: AtomicUsize,
    /// Highest number of encodes seen running at once.
    pub(crate) peak: AtomicUsize,
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn compose(
        &self,
        clips: &[PathBuf],
        audio: &Path,
        output: &Path,
    ) -> PipelineResult<PathBuf> {
        assert!(audio.exists());
        self.seen.lock().unwrap().extend(clips.iter().cloned());
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::ffmpeg_failed("encode", None, Some(1)));
        }
        std::fs::write(output, b"mp4")?;
        Ok(output.to_path_buf())
    }
}
