use super::decode::AudioBuffer;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunk length must be positive, got {0}s")]
    NonPositiveChunk(f64),
    #[error("overlap ({overlap}s) must be shorter than the chunk length ({chunk}s)")]
    OverlapTooLarge { overlap: f64, chunk: f64 },
}

/// One window of audio sent to the speech model as a unit.
///
/// Windows after the first share `overlap` seconds with their predecessor
/// so words spanning a boundary appear in both.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub index: usize,
    pub samples: Vec<f32>,
    /// Start offset in seconds relative to the whole recording.
    pub start_secs: f64,
    /// End offset in seconds relative to the whole recording.
    pub end_secs: f64,
}

impl AudioChunk {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Validated windowing parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan {
    chunk_secs: f64,
    overlap_secs: f64,
}

impl ChunkPlan {
    pub fn new(chunk_secs: f64, overlap_secs: f64) -> Result<Self, ChunkError> {
        if chunk_secs <= 0.0 {
            return Err(ChunkError::NonPositiveChunk(chunk_secs));
        }
        if overlap_secs < 0.0 || overlap_secs >= chunk_secs {
            return Err(ChunkError::OverlapTooLarge {
                overlap: overlap_secs,
                chunk: chunk_secs,
            });
        }
        Ok(Self {
            chunk_secs,
            overlap_secs,
        })
    }

    /// Split the buffer into overlapping windows covering the whole duration.
    ///
    /// Audio shorter than one chunk is returned as a single window. The
    /// final window may be shorter than `chunk_secs`; it is never padded.
    pub fn split(&self, audio: &AudioBuffer) -> Vec<AudioChunk> {
        let rate = audio.sample_rate as f64;
        let chunk_samples = (self.chunk_secs * rate) as usize;
        let overlap_samples = (self.overlap_secs * rate) as usize;
        let total = audio.samples.len();

        let mut chunks = Vec::new();

        if total <= chunk_samples {
            chunks.push(AudioChunk {
                index: 0,
                samples: audio.samples.clone(),
                start_secs: 0.0,
                end_secs: total as f64 / rate,
            });
        } else {
            let stride = chunk_samples - overlap_samples;
            let mut start = 0usize;
            loop {
                let end = (start + chunk_samples).min(total);
                chunks.push(AudioChunk {
                    index: chunks.len(),
                    samples: audio.samples[start..end].to_vec(),
                    start_secs: start as f64 / rate,
                    end_secs: end as f64 / rate,
                });
                if end >= total {
                    break;
                }
                start += stride;
            }
        }

        info!(
            "Split {:.1}s of audio into {} chunks ({}s windows, {}s overlap)",
            audio.duration_secs(),
            chunks.len(),
            self.chunk_secs,
            self.overlap_secs
        );

        chunks
    }
}
