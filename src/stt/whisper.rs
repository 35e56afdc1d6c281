use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::backend::{BackendError, SpeechBackend};

/// Sample rate the Whisper models expect.
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    /// Get the Hugging Face URL for this model
    pub fn hf_url(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin",
            WhisperModel::Base => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin",
            WhisperModel::Small => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin",
            WhisperModel::Medium => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-medium.bin",
            WhisperModel::Large => "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3.bin",
        }
    }

    /// Get the filename for this model
    pub fn filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large-v3.bin",
        }
    }

    /// Stable identifier used in transcript records and API responses
    pub fn id(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny",
            WhisperModel::Base => "ggml-base",
            WhisperModel::Small => "ggml-small",
            WhisperModel::Medium => "ggml-medium",
            WhisperModel::Large => "ggml-large-v3",
        }
    }

    /// Get approximate model size in MB
    pub fn size_mb(&self) -> u64 {
        match self {
            WhisperModel::Tiny => 75,
            WhisperModel::Base => 142,
            WhisperModel::Small => 466,
            WhisperModel::Medium => 1500,
            WhisperModel::Large => 3100,
        }
    }
}

impl std::fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WhisperModel::Tiny => write!(f, "tiny"),
            WhisperModel::Base => write!(f, "base"),
            WhisperModel::Small => write!(f, "small"),
            WhisperModel::Medium => write!(f, "medium"),
            WhisperModel::Large => write!(f, "large"),
        }
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(format!(
                "Unknown model: {}. Use tiny, base, small, medium, or large",
                s
            )),
        }
    }
}

/// Check if a model is already downloaded
pub fn is_model_downloaded(model: WhisperModel, models_dir: &Path) -> bool {
    let path = models_dir.join(model.filename());
    if !path.exists() {
        return false;
    }

    // Reject obviously truncated downloads
    if let Ok(metadata) = fs::metadata(&path) {
        let expected_bytes = model.size_mb() * 1024 * 1024;
        return metadata.len() >= expected_bytes / 2;
    }

    false
}

/// Download a Whisper model from Hugging Face
pub fn download_model(model: WhisperModel, models_dir: &Path) -> Result<PathBuf, BackendError> {
    let path = models_dir.join(model.filename());

    if is_model_downloaded(model, models_dir) {
        info!("Model {} already downloaded at {:?}", model, path);
        return Ok(path);
    }

    fs::create_dir_all(models_dir)?;

    info!(
        "Downloading Whisper {} model (~{}MB)...",
        model,
        model.size_mb()
    );

    let url = model.hf_url();

    let response = reqwest::blocking::Client::new()
        .get(url)
        .send()
        .map_err(|e| BackendError::Download(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(BackendError::Download(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = indicatif::ProgressBar::new(total_size);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let temp_path = path.with_extension("bin.tmp");
    let mut file = File::create(&temp_path)?;

    let bytes = response
        .bytes()
        .map_err(|e| BackendError::Download(format!("Failed to read response: {}", e)))?;

    file.write_all(&bytes)?;
    pb.set_position(bytes.len() as u64);
    pb.finish_with_message("Download complete");

    fs::rename(&temp_path, &path)?;

    info!("Model downloaded to {:?}", path);

    Ok(path)
}

/// Speech backend backed by whisper.cpp via whisper-rs.
///
/// The context is loaded lazily on the first `load` call and stays
/// resident until `unload`; a fresh inference state is created per window.
pub struct WhisperBackend {
    model: WhisperModel,
    models_dir: PathBuf,
    n_threads: i32,
    ctx: Option<WhisperContext>,
}

impl WhisperBackend {
    pub fn new(model: WhisperModel, models_dir: PathBuf) -> Self {
        // Use available CPU threads (leave 1 for system)
        let n_threads = std::thread::available_parallelism()
            .map(|p| (p.get() as i32 - 1).max(1))
            .unwrap_or(4);

        Self {
            model,
            models_dir,
            n_threads,
            ctx: None,
        }
    }
}

impl SpeechBackend for WhisperBackend {
    fn load(&mut self) -> Result<(), BackendError> {
        if self.ctx.is_some() {
            return Ok(());
        }

        let path = download_model(self.model, &self.models_dir)?;

        info!("Loading Whisper {} model...", self.model);

        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::Load(format!("non-UTF8 model path: {:?}", path)))?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| BackendError::Load(format!("Failed to load model: {}", e)))?;

        info!(
            "Whisper model loaded successfully (using {} threads)",
            self.n_threads
        );

        self.ctx = Some(ctx);
        Ok(())
    }

    fn unload(&mut self) {
        if self.ctx.take().is_some() {
            info!("Whisper model unloaded");
        }
    }

    fn is_ready(&self) -> bool {
        self.ctx.is_some()
    }

    fn model_id(&self) -> &str {
        self.model.id()
    }

    fn transcribe(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        language: &str,
    ) -> Result<String, BackendError> {
        if sample_rate != WHISPER_SAMPLE_RATE {
            return Err(BackendError::Inference(format!(
                "expected {}Hz audio, got {}Hz",
                WHISPER_SAMPLE_RATE, sample_rate
            )));
        }

        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| BackendError::Inference("model not loaded".to_string()))?;

        // Greedy sampling for speed (beam search is 2-3x slower)
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        params.set_n_threads(self.n_threads);
        params.set_language(Some(language));
        params.set_translate(false);

        // Segment-level timestamps are unused here; chunk bounds are kept
        params.set_token_timestamps(false);

        // Hallucination prevention
        params.set_no_speech_thold(0.6);
        params.set_entropy_thold(2.4);
        params.set_logprob_thold(-1.0);
        params.set_temperature(0.0);
        params.set_temperature_inc(0.2);
        params.set_no_context(true);
        params.set_suppress_non_speech_tokens(true);

        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_print_special(false);

        let mut state = ctx
            .create_state()
            .map_err(|e| BackendError::Inference(format!("Failed to create state: {}", e)))?;

        state
            .full(params, samples)
            .map_err(|e| BackendError::Inference(format!("Inference failed: {}", e)))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| BackendError::Inference(format!("Failed to get segments: {}", e)))?;

        let mut text = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| BackendError::Inference(format!("Failed to get text: {}", e)))?;
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment);
        }

        Ok(text)
    }
}
