use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to download model: {0}")]
    Download(String),
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Capability interface over a speech-to-text model.
///
/// Implementations wrap a real inference engine; tests substitute a
/// deterministic scripted backend. `load` is idempotent and `unload` is
/// safe to call when nothing is loaded. A failed `transcribe` call for one
/// window must leave the backend usable for the next.
pub trait SpeechBackend: Send {
    fn load(&mut self) -> Result<(), BackendError>;

    fn unload(&mut self);

    fn is_ready(&self) -> bool;

    /// Stable identifier of the underlying model, e.g. `ggml-small`.
    fn model_id(&self) -> &str;

    /// Transcribe one window of mono audio. An empty string means the
    /// model produced no usable text for this window.
    fn transcribe(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        language: &str,
    ) -> Result<String, BackendError>;
}
