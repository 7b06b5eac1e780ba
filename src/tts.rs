use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info};

use crate::error::{PipelineError, PipelineResult};

/// Renders narration text to an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, out_path: &Path) -> PipelineResult<PathBuf>;
}

/// Local Piper TTS; text goes in on stdin, a WAV file comes out.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    pub binary: String,
    pub model: PathBuf,
}

impl PiperSynthesizer {
    pub fn new(binary: impl Into<String>, model: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }

    fn command(&self, out_path: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--model")
            .arg(&self.model)
            .arg("--output_file")
            .arg(out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl SpeechSynthesizer for PiperSynthesizer {
    async fn synthesize(&self, text: &str, out_path: &Path) -> PipelineResult<PathBuf> {
        which::which(&self.binary).map_err(|_| PipelineError::ToolNotFound("piper"))?;
        info!("Calling Piper TTS for output file {}", out_path.display());

        let mut child = self.command(out_path).spawn()?;
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| PipelineError::tts_failed("piper stdin unavailable"))?;
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            error!(
                "Piper TTS command failed for {}: {}",
                out_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(PipelineError::tts_failed(format!(
                "piper exited with {:?}",
                output.status.code()
            )));
        }

        if !out_path.exists() {
            return Err(PipelineError::tts_failed(format!(
                "piper reported success but {} is missing",
                out_path.display()
            )));
        }

        info!("Audio saved to {}", out_path.display());
        Ok(out_path.to_path_buf())
    }
}
