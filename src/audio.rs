use hound::WavReader;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::probe::probe_media;

pub fn wav_duration_seconds(path: &Path) -> PipelineResult<f64> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Duration of an audio artifact in seconds.
///
/// WAV headers are read directly; anything else, or a WAV whose header
/// hound rejects, goes through ffprobe.
pub async fn audio_duration_seconds(path: &Path) -> PipelineResult<f64> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }

    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    let seconds = if is_wav {
        match wav_duration_seconds(path) {
            Ok(d) => d,
            Err(e) => {
                debug!("hound could not read {}: {}; falling back to ffprobe", path.display(), e);
                probe_media(path).await?.duration
            }
        }
    } else {
        probe_media(path).await?.duration
    };

    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(PipelineError::InvalidDuration {
            path: path.to_path_buf(),
            seconds,
        });
    }
    Ok(seconds)
}

#[cfg(test)]
pub(crate) fn write_silent_wav(path: &Path, seconds: f64, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let samples = (seconds * sample_rate as f64).round() as usize;
    for _ in 0..samples {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}
