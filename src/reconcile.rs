//! Duration reconciliation: turn a clip sequence plus narration into one
//! video exactly as long as the narration.
//!
//! Every clip is normalized to a fixed length and concatenated in order. If
//! the sequence is shorter than the audio it is repeated whole until it
//! covers the audio, then the result is cut at the audio duration. Native
//! clip audio is never mapped, so the narration is the only sound.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audio::audio_duration_seconds;
use crate::error::{PipelineError, PipelineResult};
use crate::ffmpeg::FfmpegCommand;
use crate::probe::probe_media;

const DURATION_EPSILON: f64 = 1e-6;

/// How the clip sequence relates to the narration before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationRelation {
    VideoShorter,
    Equal,
    VideoLonger,
}

/// Pure description of how a clip sequence is stretched or cut to fit the audio.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub clip_count: usize,
    pub clip_seconds: f64,
    /// Duration of one pass over all clips (`Dv`).
    pub natural_seconds: f64,
    /// Duration of the narration, and of the output (`Da`).
    pub audio_seconds: f64,
    /// How many whole passes of the clip sequence are laid end to end.
    pub loops: usize,
    pub fps: u32,
}

impl ReconcilePlan {
    pub fn new(
        clip_count: usize,
        clip_seconds: f64,
        audio_seconds: f64,
        fps: u32,
    ) -> PipelineResult<Self> {
        if clip_count == 0 {
            return Err(PipelineError::NoClips);
        }
        if !(clip_seconds.is_finite() && clip_seconds > 0.0) {
            return Err(PipelineError::InvalidPlan(format!(
                "clip length must be positive, got {}",
                clip_seconds
            )));
        }
        if !(audio_seconds.is_finite() && audio_seconds > 0.0) {
            return Err(PipelineError::InvalidPlan(format!(
                "audio duration must be positive, got {}",
                audio_seconds
            )));
        }
        if fps == 0 {
            return Err(PipelineError::InvalidPlan("frame rate must be positive".into()));
        }

        let natural_seconds = clip_count as f64 * clip_seconds;
        let loops = if natural_seconds + DURATION_EPSILON < audio_seconds {
            (audio_seconds / natural_seconds).ceil() as usize
        } else {
            1
        };

        Ok(Self {
            clip_count,
            clip_seconds,
            natural_seconds,
            audio_seconds,
            loops: loops.max(1),
            fps,
        })
    }

    pub fn relation(&self) -> DurationRelation {
        let diff = self.natural_seconds - self.audio_seconds;
        if diff.abs() <= DURATION_EPSILON {
            DurationRelation::Equal
        } else if diff < 0.0 {
            DurationRelation::VideoShorter
        } else {
            DurationRelation::VideoLonger
        }
    }

    /// Video available after looping, before the final cut.
    pub fn covered_seconds(&self) -> f64 {
        self.natural_seconds * self.loops as f64
    }

    /// Video thrown away by the final cut.
    pub fn discarded_seconds(&self) -> f64 {
        (self.covered_seconds() - self.audio_seconds).max(0.0)
    }

    /// Number of frames the encoded output holds.
    pub fn frame_count(&self) -> u64 {
        (self.audio_seconds * self.fps as f64).round().max(1.0) as u64
    }

    /// Duration of the encoded output; within half a frame of the audio.
    pub fn output_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.fps as f64
    }
}

/// Common frame every clip is letterboxed onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const FALLBACK: Canvas = Canvas {
        width: 480,
        height: 480,
    };

    /// Largest width and height among `sizes`, rounded up to even numbers
    /// so H.264 with yuv420p accepts them.
    pub fn enclosing(sizes: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let (w, h) = sizes
            .into_iter()
            .fold((0, 0), |(mw, mh), (w, h)| (mw.max(w), mh.max(h)));
        if w == 0 || h == 0 {
            return Self::FALLBACK;
        }
        Self {
            width: w + w % 2,
            height: h + h % 2,
        }
    }
}

/// Build the `-filter_complex` graph for a plan. Clip inputs are `0..n`, the
/// narration is input `n`.
pub fn build_filter_graph(plan: &ReconcilePlan, canvas: Canvas) -> String {
    let (w, h) = (canvas.width, canvas.height);
    let clip = format!("{:.3}", plan.clip_seconds);
    let mut graph = String::new();

    for i in 0..plan.clip_count {
        let _ = write!(
            graph,
            "[{i}:v]fps={fps},scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,format=yuv420p,\
             tpad=stop_mode=clone:stop_duration={clip},trim=duration={clip},\
             setpts=PTS-STARTPTS[c{i}];",
            fps = plan.fps,
        );
    }

    for i in 0..plan.clip_count {
        let _ = write!(graph, "[c{i}]");
    }
    let _ = write!(graph, "concat=n={}:v=1:a=0[seq];", plan.clip_count);

    let looped = if plan.loops > 1 {
        let _ = write!(graph, "[seq]split={}", plan.loops);
        for i in 0..plan.loops {
            let _ = write!(graph, "[s{i}]");
        }
        graph.push(';');
        for i in 0..plan.loops {
            let _ = write!(graph, "[s{i}]");
        }
        let _ = write!(graph, "concat=n={}:v=1:a=0[looped];", plan.loops);
        "looped"
    } else {
        "seq"
    };

    let target = format!("{:.3}", plan.audio_seconds);
    let _ = write!(
        graph,
        "[{looped}]trim=duration={target},setpts=PTS-STARTPTS[vout];\
         [{audio}:a]atrim=duration={target},asetpts=PTS-STARTPTS[aout]",
        audio = plan.clip_count,
    );
    graph
}

/// Assemble the full ffmpeg invocation for a plan.
pub fn build_command(
    plan: &ReconcilePlan,
    canvas: Canvas,
    clips: &[PathBuf],
    audio: &Path,
    output: &Path,
) -> FfmpegCommand {
    let clip = format!("{:.3}", plan.clip_seconds);
    let mut cmd = FfmpegCommand::new(output);

    for path in clips {
        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gif"));
        // Animated GIFs loop inside their own length; -t stops the loop.
        cmd = if is_gif {
            cmd.input_with(path, ["-ignore_loop", "0", "-t", clip.as_str()])
        } else {
            cmd.input_with(path, ["-t", clip.as_str()])
        };
    }

    cmd.input(audio)
        .filter_complex(build_filter_graph(plan, canvas))
        .map("[vout]")
        .map("[aout]")
        .video_codec("libx264")
        .output_args(["-pix_fmt", "yuv420p", "-preset", "veryfast"])
        .audio_codec("aac")
        .frame_rate(plan.fps)
        .duration(plan.output_seconds())
        .output_args(["-movflags", "+faststart"])
}

/// Final encode step of the pipeline.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Compose `clips` and `audio` into `output`, returning the written path.
    async fn compose(&self, clips: &[PathBuf], audio: &Path, output: &Path)
    -> PipelineResult<PathBuf>;
}

/// [`Compositor`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegCompositor {
    pub clip_seconds: f64,
    pub fps: u32,
}

impl FfmpegCompositor {
    pub fn new(clip_seconds: f64, fps: u32) -> Self {
        Self { clip_seconds, fps }
    }

    async fn canvas_for(&self, clips: &[PathBuf]) -> Canvas {
        let mut sizes = Vec::with_capacity(clips.len());
        for clip in clips {
            match probe_media(clip).await {
                Ok(info) if !info.has_video => {
                    warn!("{} has no video stream", clip.display());
                }
                Ok(info) => {
                    if info.has_audio {
                        debug!("Dropping native audio of {}", clip.display());
                    }
                    sizes.push((info.width, info.height));
                }
                Err(e) => warn!("Could not probe {}: {}", clip.display(), e),
            }
        }
        Canvas::enclosing(sizes)
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn compose(
        &self,
        clips: &[PathBuf],
        audio: &Path,
        output: &Path,
    ) -> PipelineResult<PathBuf> {
        if clips.is_empty() {
            return Err(PipelineError::NoClips);
        }
        if let Some(missing) = clips.iter().find(|c| !c.exists()) {
            return Err(PipelineError::FileNotFound(missing.clone()));
        }

        let audio_seconds = audio_duration_seconds(audio).await?;
        info!("Audio duration: {:.2} seconds", audio_seconds);

        let plan = ReconcilePlan::new(clips.len(), self.clip_seconds, audio_seconds, self.fps)?;
        info!(
            "Reconciling {} clips ({:.2}s) against {:.2}s of audio: {:?}, {} pass(es), {:.2}s discarded",
            plan.clip_count,
            plan.natural_seconds,
            plan.audio_seconds,
            plan.relation(),
            plan.loops,
            plan.discarded_seconds()
        );

        let canvas = self.canvas_for(clips).await;
        let cmd = build_command(&plan, canvas, clips, audio, output);

        if let Err(e) = cmd.run().await {
            discard_partial(output);
            return Err(e);
        }

        if !output.exists() {
            return Err(PipelineError::ffmpeg_failed(
                format!("{} was not written", output.display()),
                None,
                None,
            ));
        }

        info!(
            "Video with audio created at {} ({:.2}s, {} frames)",
            output.display(),
            plan.output_seconds(),
            plan.frame_count()
        );
        Ok(output.to_path_buf())
    }
}

fn discard_partial(output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            warn!("Could not remove partial output {}: {}", output.display(), e);
        }
    }
}
