use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("audio file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to decode WAV: {0}")]
    Wav(#[from] hound::Error),
    #[error("unsupported sample format: {bits}-bit {format}")]
    UnsupportedFormat { bits: u16, format: &'static str },
    #[error("audio file contains no channels")]
    NoChannels,
}

/// Decoded audio ready for the transcription pipeline: mono, normalized
/// to [-1.0, 1.0], at a fixed sample rate.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load a WAV file and normalize it to mono f32 at `target_rate`.
///
/// Channels are averaged down to mono; other sample rates are resampled
/// with linear interpolation. The same input always yields the same buffer.
pub fn load_audio(path: &Path, target_rate: u32) -> Result<AudioBuffer, DecodeError> {
    if !path.exists() {
        return Err(DecodeError::NotFound(path.to_path_buf()));
    }

    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(DecodeError::NoChannels);
    }

    let raw: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<Vec<_>, _>>()?,
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
        (hound::SampleFormat::Int, bits) => {
            return Err(DecodeError::UnsupportedFormat {
                bits,
                format: "integer",
            })
        }
        (hound::SampleFormat::Float, bits) => {
            return Err(DecodeError::UnsupportedFormat {
                bits,
                format: "float",
            })
        }
    };

    let mono = downmix(&raw, spec.channels);
    let samples = if spec.sample_rate == target_rate {
        mono
    } else {
        resample(&mono, spec.sample_rate, target_rate)
    };

    let buffer = AudioBuffer {
        samples,
        sample_rate: target_rate,
    };

    info!(
        "Loaded {:?}: {:.1}s at {}Hz ({} samples after normalization)",
        path.file_name().unwrap_or_default(),
        buffer.duration_secs(),
        target_rate,
        buffer.samples.len()
    );

    Ok(buffer)
}

/// Average interleaved channel frames down to mono.
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_wav(path: &Path, spec: hound::WavSpec, frames: &[Vec<i16>]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &sample in frame {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = load_audio(&PathBuf::from("does-not-exist.wav"), 16000).unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn test_mono_16khz_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(&path, spec, &[vec![0], vec![16384], vec![-16384]]);

        let buffer = load_audio(&path, 16000).unwrap();
        assert_eq!(buffer.sample_rate, 16000);
        assert_eq!(buffer.samples.len(), 3);
        assert!((buffer.samples[1] - 0.5).abs() < 0.001);
        assert!((buffer.samples[2] + 0.5).abs() < 0.001);
    }

    #[test]
    fn test_stereo_downmix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        // Left 0.5, right -0.5 averages to silence; both 0.5 stays 0.5.
        write_wav(&path, spec, &[vec![16384, -16384], vec![16384, 16384]]);

        let buffer = load_audio(&path, 16000).unwrap();
        assert_eq!(buffer.samples.len(), 2);
        assert!(buffer.samples[0].abs() < 0.001);
        assert!((buffer.samples[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_resample_halves_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 32000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let frames: Vec<Vec<i16>> = (0..3200).map(|_| vec![1000]).collect();
        write_wav(&path, spec, &frames);

        let buffer = load_audio(&path, 16000).unwrap();
        assert_eq!(buffer.sample_rate, 16000);
        assert_eq!(buffer.samples.len(), 1600);
        assert!((buffer.duration_secs() - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("det.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let frames: Vec<Vec<i16>> = (0..441)
            .map(|i| vec![(i * 37 % 1000) as i16, (i * 13 % 1000) as i16])
            .collect();
        write_wav(&path, spec, &frames);

        let first = load_audio(&path, 16000).unwrap();
        let second = load_audio(&path, 16000).unwrap();
        assert_eq!(first.samples, second.samples);
    }

    #[test]
    fn test_downsample_averages_toward_mono() {
        let mono = downmix(&[0.2, 0.4, 0.6, 0.8], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] - 0.7).abs() < 1e-6);
    }
}
