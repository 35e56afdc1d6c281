use sqlx::SqliteConnection;
use uuid::Uuid;

use super::DbPool;
use crate::stt::pipeline::TranscriptionResult;
use crate::stt::TranscriptSegment;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TranscriptRecord {
    pub id: String,
    pub session_id: String,
    pub full_text: String,
    /// Ordered segments serialized as JSON.
    pub segments: String,
    pub language: String,
    pub model_version: String,
    pub processing_duration_ms: i64,
    pub created_at: String,
}

impl TranscriptRecord {
    pub fn decode_segments(&self) -> Vec<TranscriptSegment> {
        serde_json::from_str(&self.segments).unwrap_or_default()
    }
}

pub async fn find_by_session(
    pool: &DbPool,
    session_id: &str,
) -> Result<Option<TranscriptRecord>, sqlx::Error> {
    sqlx::query_as::<_, TranscriptRecord>("SELECT * FROM transcripts WHERE session_id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await
}

/// Create the session's transcript, or replace its content in place.
///
/// Runs inside an open transaction so the caller can commit it together
/// with the session status change. A session keeps exactly one transcript
/// row for life; re-transcription overwrites it.
pub async fn upsert_tx(
    conn: &mut SqliteConnection,
    session_id: &str,
    result: &TranscriptionResult,
) -> Result<(), sqlx::Error> {
    let segments_json = serde_json::to_string(&result.segments).unwrap_or_default();
    let id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO transcripts
            (id, session_id, full_text, segments, language, model_version, processing_duration_ms, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id)
        DO UPDATE SET
            full_text = excluded.full_text,
            segments = excluded.segments,
            language = excluded.language,
            model_version = excluded.model_version,
            processing_duration_ms = excluded.processing_duration_ms
        "#,
    )
    .bind(&id)
    .bind(session_id)
    .bind(&result.full_text)
    .bind(&segments_json)
    .bind(&result.language)
    .bind(&result.model_used)
    .bind(result.processing_duration_ms)
    .bind(&created_at)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sessions::{self, SessionStatus};
    use crate::db::test_pool;

    fn result_with_text(text: &str) -> TranscriptionResult {
        TranscriptionResult {
            success: true,
            full_text: text.to_string(),
            segments: vec![TranscriptSegment {
                text: text.to_string(),
                start_time: 0.0,
                end_time: 30.0,
                confidence: None,
            }],
            processing_duration_ms: 1200,
            model_used: "ggml-small".to_string(),
            language: "no".to_string(),
            audio_duration_seconds: 30.0,
            chunks_processed: 1,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_in_place() {
        let pool = test_pool().await;
        let session =
            sessions::find_or_create(&pool, "tape.wav", None, None, SessionStatus::Transcribing)
                .await
                .unwrap();

        let mut tx = pool.begin().await.unwrap();
        upsert_tx(&mut tx, &session.id, &result_with_text("first pass"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let first = find_by_session(&pool, &session.id).await.unwrap().unwrap();
        assert_eq!(first.full_text, "first pass");
        assert_eq!(first.decode_segments().len(), 1);

        let mut tx = pool.begin().await.unwrap();
        upsert_tx(&mut tx, &session.id, &result_with_text("second pass"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let second = find_by_session(&pool, &session.id).await.unwrap().unwrap();
        // Same row, new content
        assert_eq!(second.id, first.id);
        assert_eq!(second.full_text, "second pass");
    }

    #[tokio::test]
    async fn test_segments_json_roundtrip() {
        let pool = test_pool().await;
        let session =
            sessions::find_or_create(&pool, "seg.wav", None, None, SessionStatus::Transcribing)
                .await
                .unwrap();

        let result = TranscriptionResult {
            segments: vec![
                TranscriptSegment {
                    text: "part one".into(),
                    start_time: 0.0,
                    end_time: 30.0,
                    confidence: None,
                },
                TranscriptSegment {
                    text: "part two".into(),
                    start_time: 29.0,
                    end_time: 59.0,
                    confidence: Some(0.9),
                },
            ],
            ..result_with_text("part one part two")
        };

        let mut tx = pool.begin().await.unwrap();
        upsert_tx(&mut tx, &session.id, &result).await.unwrap();
        tx.commit().await.unwrap();

        let record = find_by_session(&pool, &session.id).await.unwrap().unwrap();
        let segments = record.decode_segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "part two");
        assert_eq!(segments[1].confidence, Some(0.9));
        assert!((segments[1].start_time - 29.0).abs() < 1e-9);
    }
}
