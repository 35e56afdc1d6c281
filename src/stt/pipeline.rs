//! The transcription pipeline: decode, window, transcribe, stitch.
//!
//! One invocation walks the stages in order and always returns a
//! `TranscriptionResult`; failures before inference (missing file, model
//! load, decode) end the run with `success = false`, while a failing
//! individual window only leaves a gap in the transcript.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use super::backend::SpeechBackend;
use super::stitch::{StitchConfig, Stitcher};
use super::TranscriptSegment;
use crate::audio::{load_audio, ChunkError, ChunkPlan};

/// Pipeline tuning. Defaults mirror the production service: 16kHz audio,
/// 30s windows with 1s overlap, 3-word boundary dedup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub chunk_secs: f64,
    pub overlap_secs: f64,
    pub dedup_window: usize,
    pub language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            chunk_secs: 30.0,
            overlap_secs: 1.0,
            dedup_window: 3,
            language: "no".to_string(),
        }
    }
}

/// Everything one pipeline run produced, success or not.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    pub success: bool,
    pub full_text: String,
    pub segments: Vec<TranscriptSegment>,
    pub processing_duration_ms: i64,
    pub model_used: String,
    pub language: String,
    pub audio_duration_seconds: f64,
    pub chunks_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Readiness snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub model_loaded: bool,
    pub model_id: String,
    pub language: String,
    pub sample_rate: u32,
    pub chunk_secs: f64,
    pub overlap_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ModelLoading,
    Preprocessing,
    Chunking,
    Transcribing,
    Reconciling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ModelLoading => write!(f, "model loading"),
            Stage::Preprocessing => write!(f, "preprocessing"),
            Stage::Chunking => write!(f, "chunking"),
            Stage::Transcribing => write!(f, "transcribing"),
            Stage::Reconciling => write!(f, "reconciling"),
        }
    }
}

/// Owns the speech backend and runs whole files through it.
///
/// The backend sits behind a mutex: windows are transcribed strictly
/// sequentially and concurrent callers queue for the model rather than
/// sharing it. The model loads lazily on the first run and stays resident
/// across runs until `unload`.
pub struct TranscriptionPipeline {
    config: PipelineConfig,
    plan: ChunkPlan,
    model_id: String,
    backend: Mutex<Box<dyn SpeechBackend>>,
}

impl TranscriptionPipeline {
    pub fn new(
        backend: Box<dyn SpeechBackend>,
        config: PipelineConfig,
    ) -> Result<Self, ChunkError> {
        let plan = ChunkPlan::new(config.chunk_secs, config.overlap_secs)?;
        let model_id = backend.model_id().to_string();
        Ok(Self {
            config,
            plan,
            model_id,
            backend: Mutex::new(backend),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }

    pub fn status(&self) -> PipelineStatus {
        // A running transcription holds the lock for its whole duration;
        // report the model as loaded rather than waiting for it.
        let loaded = match self.backend.try_lock() {
            Ok(backend) => backend.is_ready(),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_ready(),
            Err(std::sync::TryLockError::WouldBlock) => true,
        };
        PipelineStatus {
            model_loaded: loaded,
            model_id: self.model_id.clone(),
            language: self.config.language.clone(),
            sample_rate: self.config.sample_rate,
            chunk_secs: self.config.chunk_secs,
            overlap_secs: self.config.overlap_secs,
        }
    }

    /// Release the loaded model. Safe to call when nothing is loaded; the
    /// next transcription reloads it.
    pub fn unload(&self) {
        match self.backend.lock() {
            Ok(mut backend) => backend.unload(),
            Err(poisoned) => poisoned.into_inner().unload(),
        }
    }

    /// Transcribe one audio file end to end.
    ///
    /// This is a blocking call; async callers should run it on a worker
    /// thread. It never panics across this boundary and never returns a
    /// raised fault: every failure mode becomes `success = false`.
    pub fn transcribe_file(&self, path: &Path) -> TranscriptionResult {
        let started = Instant::now();

        let mut backend = match self.backend.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        info!("Starting transcription of {:?}", path);

        if !path.exists() {
            return self.fail(
                started,
                Stage::Preprocessing,
                format!("audio file not found: {}", path.display()),
            );
        }

        info!(stage = %Stage::ModelLoading, "Ensuring {} is resident", self.model_id);
        if let Err(e) = backend.load() {
            return self.fail(
                started,
                Stage::ModelLoading,
                format!("failed to load transcription model: {}", e),
            );
        }

        info!(stage = %Stage::Preprocessing, "Decoding {:?}", path.file_name().unwrap_or_default());
        let audio = match load_audio(path, self.config.sample_rate) {
            Ok(audio) => audio,
            Err(e) => return self.fail(started, Stage::Preprocessing, e.to_string()),
        };
        let audio_duration = audio.duration_secs();

        info!(stage = %Stage::Chunking, "Windowing {:.1}s of audio", audio_duration);
        let chunks = self.plan.split(&audio);
        let chunk_count = chunks.len();

        let mut stitcher = Stitcher::new(StitchConfig {
            dedup_window: self.config.dedup_window,
        });

        for chunk in &chunks {
            info!(
                stage = %Stage::Transcribing,
                "Processing chunk {}/{} ({:.1}s - {:.1}s)",
                chunk.index + 1,
                chunk_count,
                chunk.start_secs,
                chunk.end_secs
            );

            let text = match backend.transcribe(
                &chunk.samples,
                self.config.sample_rate,
                &self.config.language,
            ) {
                Ok(text) => text,
                Err(e) => {
                    // One bad window degrades the transcript locally; the
                    // rest of the recording still goes through.
                    warn!("Chunk {} failed, leaving a gap: {}", chunk.index, e);
                    String::new()
                }
            };

            stitcher.push_chunk(&text, chunk.start_secs, chunk.end_secs);
        }

        info!(stage = %Stage::Reconciling, "Merging {} chunk transcripts", chunk_count);
        let (full_text, segments) = stitcher.finish();

        let processing_duration_ms = started.elapsed().as_millis() as i64;
        info!(
            "Transcription completed: {} characters, {} segments, {} chunks in {}ms",
            full_text.len(),
            segments.len(),
            chunk_count,
            processing_duration_ms
        );

        TranscriptionResult {
            success: true,
            full_text,
            segments,
            processing_duration_ms,
            model_used: self.model_id.clone(),
            language: self.config.language.clone(),
            audio_duration_seconds: audio_duration,
            chunks_processed: chunk_count,
            error_message: None,
        }
    }

    fn fail(&self, started: Instant, stage: Stage, message: String) -> TranscriptionResult {
        error!("Transcription failed during {}: {}", stage, message);
        TranscriptionResult {
            success: false,
            full_text: String::new(),
            segments: Vec::new(),
            processing_duration_ms: started.elapsed().as_millis() as i64,
            model_used: self.model_id.clone(),
            language: self.config.language.clone(),
            audio_duration_seconds: 0.0,
            chunks_processed: 0,
            error_message: Some(message),
        }
    }
}
