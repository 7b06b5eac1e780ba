//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{PipelineError, PipelineResult};

/// One `-i` input together with the options that precede it.
#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for multi-input FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output: PathBuf,
    output_args: Vec<String>,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add an input with no options.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(path, std::iter::empty::<String>())
    }

    /// Add an input preceded by `args` (e.g. `-t 5`).
    pub fn input_with<I, S>(mut self, path: impl AsRef<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn filter_complex(self, graph: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(graph)
    }

    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Cap the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
        ];

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }

    /// Run to completion, failing on a non-zero exit status.
    pub async fn run(&self) -> PipelineResult<()> {
        which::which("ffmpeg").map_err(|_| PipelineError::ToolNotFound("ffmpeg"))?;

        let args = self.build_args();
        debug!("ffmpeg {}", args.join(" "));

        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(
                "ffmpeg failed for {} (exit {:?}): {}",
                self.output.display(),
                output.status.code(),
                stderr_tail(&stderr, 20)
            );
            return Err(PipelineError::ffmpeg_failed(
                format!("could not produce {}", self.output.display()),
                Some(stderr),
                output.status.code(),
            ));
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_keep_their_own_options() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input_with("a.gif", ["-t", "5"])
            .input("speech.wav")
            .map("[v]")
            .map("1:a")
            .frame_rate(24)
            .duration(12.5);
        let args = cmd.build_args();
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -hide_banner -v error"));
        assert!(joined.contains("-t 5 -i a.gif -i speech.wav"));
        assert!(joined.contains("-map [v] -map 1:a -r 24 -t 12.500"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        assert_eq!(stderr_tail("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(stderr_tail("only", 5), "only");
    }
}
