//! Session lifecycle around transcription requests.
//!
//! A session tracks one recording by filename. Requesting transcription is
//! idempotent: once a transcript exists for the filename, every later
//! request returns it without touching the model. Status transitions and
//! transcript writes commit together, so a session is never left marked
//! `transcribed` without its transcript (or the other way around).

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::sessions::{self, SessionStatus};
use crate::db::transcripts::{self, TranscriptRecord};
use crate::db::DbPool;
use crate::files;
use crate::stt::pipeline::{TranscriptionPipeline, TranscriptionResult};

#[derive(Error, Debug)]
pub enum RequestError {
    /// The audio file is in none of the known locations. Nothing was
    /// persisted; the caller decides whether to retry after ingest.
    #[error("audio file not found: {0}")]
    NotFound(String),
    /// A repository read/write failed. Distinct from an inference failure
    /// so clients can tell "transcription failed" from "result computed
    /// but not saved".
    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResponse {
    pub session_id: String,
    pub success: bool,
    pub full_text: String,
    pub segments_count: usize,
    pub processing_duration_ms: i64,
    pub audio_duration_seconds: f64,
    pub chunks_processed: usize,
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub struct SessionService {
    db: DbPool,
    pipeline: Arc<TranscriptionPipeline>,
    storage_root: PathBuf,
}

impl SessionService {
    pub fn new(db: DbPool, pipeline: Arc<TranscriptionPipeline>, storage_root: PathBuf) -> Self {
        Self {
            db,
            pipeline,
            storage_root,
        }
    }

    pub fn pipeline(&self) -> &Arc<TranscriptionPipeline> {
        &self.pipeline
    }

    /// Transcribe `filename`, or return its stored transcript.
    ///
    /// At most one transcription is ever computed per filename unless the
    /// transcript record is cleared externally. The session lookup is the
    /// only idempotency gate; the unique filename constraint keeps racing
    /// first-time requests on one session row.
    pub async fn request_transcription(
        &self,
        filename: &str,
    ) -> Result<TranscriptionResponse, RequestError> {
        let audio_path = files::resolve_audio_path(&self.storage_root, filename)
            .ok_or_else(|| RequestError::NotFound(filename.to_string()))?;

        let session = match sessions::find_by_filename(&self.db, filename).await? {
            Some(session) => {
                if let Some(transcript) =
                    transcripts::find_by_session(&self.db, &session.id).await?
                {
                    info!(
                        "Transcript already exists for {}, returning stored result",
                        filename
                    );
                    return Ok(existing_response(&session.id, &transcript));
                }
                session
            }
            None => {
                let resolved = audio_path.to_string_lossy();
                let session = sessions::find_or_create(
                    &self.db,
                    filename,
                    Some(resolved.as_ref()),
                    None,
                    SessionStatus::Transcribing,
                )
                .await?;
                info!("Created session {} for {}", session.id, filename);
                session
            }
        };

        // The whole pipeline run is one blocking unit of work; inference
        // holds the model for the duration.
        let pipeline = Arc::clone(&self.pipeline);
        let path = audio_path.clone();
        let result = match tokio::task::spawn_blocking(move || pipeline.transcribe_file(&path))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Transcription task for {} did not complete: {}", filename, e);
                failed_result(&self.pipeline, format!("transcription task failed: {}", e))
            }
        };

        if result.success {
            let mut tx = self.db.begin().await?;
            transcripts::upsert_tx(&mut tx, &session.id, &result).await?;
            sessions::set_status_tx(&mut tx, &session.id, SessionStatus::Transcribed).await?;
            tx.commit().await?;
            info!("Transcription completed and saved for {}", filename);
        } else {
            sessions::set_status(&self.db, &session.id, SessionStatus::Error).await?;
            warn!(
                "Transcription failed for {}: {}",
                filename,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        Ok(response_from_result(&session.id, &result))
    }
}

fn existing_response(session_id: &str, transcript: &TranscriptRecord) -> TranscriptionResponse {
    TranscriptionResponse {
        session_id: session_id.to_string(),
        success: true,
        full_text: transcript.full_text.clone(),
        segments_count: transcript.decode_segments().len(),
        processing_duration_ms: transcript.processing_duration_ms,
        // Not recomputed for stored transcripts
        audio_duration_seconds: 0.0,
        chunks_processed: 0,
        model_used: transcript.model_version.clone(),
        error_message: None,
    }
}

fn response_from_result(session_id: &str, result: &TranscriptionResult) -> TranscriptionResponse {
    TranscriptionResponse {
        session_id: session_id.to_string(),
        success: result.success,
        full_text: result.full_text.clone(),
        segments_count: result.segments.len(),
        processing_duration_ms: result.processing_duration_ms,
        audio_duration_seconds: result.audio_duration_seconds,
        chunks_processed: result.chunks_processed,
        model_used: result.model_used.clone(),
        error_message: result.error_message.clone(),
    }
}

fn failed_result(pipeline: &TranscriptionPipeline, message: String) -> TranscriptionResult {
    TranscriptionResult {
        success: false,
        full_text: String::new(),
        segments: Vec::new(),
        processing_duration_ms: 0,
        model_used: pipeline.model_id().to_string(),
        language: pipeline.language().to_string(),
        audio_duration_seconds: 0.0,
        chunks_processed: 0,
        error_message: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::stt::backend::testing::ScriptedBackend;
    use crate::stt::pipeline::PipelineConfig;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_test_wav(path: &Path, duration_secs: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..(duration_secs * 16000.0) as usize {
            writer.write_sample(1000i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    async fn service_with(
        backend: ScriptedBackend,
        storage_root: &Path,
    ) -> (SessionService, std::sync::Arc<AtomicUsize>) {
        let calls = backend.call_counter();
        let pipeline = Arc::new(
            TranscriptionPipeline::new(Box::new(backend), PipelineConfig::default()).unwrap(),
        );
        let service = SessionService::new(test_pool().await, pipeline, storage_root.to_path_buf());
        (service, calls)
    }

    #[tokio::test]
    async fn test_missing_file_creates_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_with(ScriptedBackend::new(vec![]), dir.path()).await;

        let err = service.request_transcription("missing.wav").await.unwrap_err();
        assert!(matches!(err, RequestError::NotFound(_)));

        let listed = sessions::list(&service.db, None, 50).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_transcription_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(files::CONVERTED_DIR)).unwrap();
        write_test_wav(&dir.path().join(files::CONVERTED_DIR).join("clip.wav"), 5.0);

        let backend = ScriptedBackend::new(vec![Ok("hello from the farm".into())]);
        let (service, calls) = service_with(backend, dir.path()).await;

        let first = service.request_transcription("clip.wav").await.unwrap();
        assert!(first.success);
        assert_eq!(first.full_text, "hello from the farm");
        assert_eq!(first.chunks_processed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = service.request_transcription("clip.wav").await.unwrap();
        assert!(second.success);
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.full_text, first.full_text);
        // No second inference run
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let session = sessions::find_by_filename(&service.db, "clip.wav")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, "transcribed");
    }

    #[tokio::test]
    async fn test_pipeline_failure_marks_session_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(files::ORIGINALS_DIR)).unwrap();
        write_test_wav(&dir.path().join(files::ORIGINALS_DIR).join("bad.wav"), 5.0);

        let (service, _) = service_with(ScriptedBackend::failing_load(), dir.path()).await;

        let response = service.request_transcription("bad.wav").await.unwrap();
        assert!(!response.success);
        assert!(response.error_message.is_some());

        let session = sessions::find_by_filename(&service.db, "bad.wav")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, "error");
        // Failure persists no transcript
        assert!(transcripts::find_by_session(&service.db, &session.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_retry_after_failure_runs_inference_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(files::CONVERTED_DIR)).unwrap();
        write_test_wav(
            &dir.path().join(files::CONVERTED_DIR).join("retry.wav"),
            5.0,
        );

        // Fail once with a broken backend, then retry against the same
        // database with a working one.
        let pool = test_pool().await;

        let failing = Arc::new(
            TranscriptionPipeline::new(
                Box::new(ScriptedBackend::failing_load()),
                PipelineConfig::default(),
            )
            .unwrap(),
        );
        let service = SessionService::new(pool.clone(), failing, dir.path().to_path_buf());
        let response = service.request_transcription("retry.wav").await.unwrap();
        assert!(!response.success);

        let working = ScriptedBackend::new(vec![Ok("second attempt".into())]);
        let calls = working.call_counter();
        let pipeline = Arc::new(
            TranscriptionPipeline::new(Box::new(working), PipelineConfig::default()).unwrap(),
        );
        let service = SessionService::new(pool.clone(), pipeline, dir.path().to_path_buf());

        let retried = service.request_transcription("retry.wav").await.unwrap();
        assert!(retried.success);
        assert_eq!(retried.session_id, response.session_id);
        assert_eq!(retried.full_text, "second attempt");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let session = sessions::find_by_filename(&pool, "retry.wav")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, "transcribed");
    }

    #[tokio::test]
    async fn test_graceful_chunk_failure_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(files::CONVERTED_DIR)).unwrap();
        write_test_wav(&dir.path().join(files::CONVERTED_DIR).join("long.wav"), 65.0);

        let backend = ScriptedBackend::new(vec![
            Ok("first stretch".into()),
            Err("one bad window".into()),
            Ok("final stretch".into()),
        ]);
        let (service, _) = service_with(backend, dir.path()).await;

        let response = service.request_transcription("long.wav").await.unwrap();
        assert!(response.success);
        assert_eq!(response.chunks_processed, 3);
        assert_eq!(response.segments_count, 2);
        assert_eq!(response.full_text, "first stretch final stretch");

        let session = sessions::find_by_filename(&service.db, "long.wav")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, "transcribed");
    }
}
