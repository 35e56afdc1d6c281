use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::DbPool;

/// Lifecycle states a recording session moves through. Earlier states
/// (upload detection, download, conversion) are written by the ingest
/// tooling; this service owns the transcription transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Detected,
    Transcribing,
    Transcribed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Detected => "detected",
            SessionStatus::Transcribing => "transcribing",
            SessionStatus::Transcribed => "transcribed",
            SessionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detected" => Ok(SessionStatus::Detected),
            "transcribing" => Ok(SessionStatus::Transcribing),
            "transcribed" => Ok(SessionStatus::Transcribed),
            "error" => Ok(SessionStatus::Error),
            _ => Err(format!(
                "Unknown status: {}. Use detected, transcribing, transcribed, or error",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub filename: String,
    pub original_path: Option<String>,
    pub converted_path: Option<String>,
    pub status: String,
    pub created_at: String,
}

pub async fn find_by_filename(
    pool: &DbPool,
    filename: &str,
) -> Result<Option<SessionRecord>, sqlx::Error> {
    sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE filename = ?")
        .bind(filename)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<SessionRecord>, sqlx::Error> {
    sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Create a session for `filename`, or return the existing one.
///
/// The filename carries a unique constraint, so two racing first-time
/// requests converge on a single row; the loser's insert is a no-op and
/// the re-select below picks up the winner's record.
pub async fn find_or_create(
    pool: &DbPool,
    filename: &str,
    converted_path: Option<&str>,
    original_path: Option<&str>,
    status: SessionStatus,
) -> Result<SessionRecord, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO sessions (id, filename, original_path, converted_path, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(filename) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(filename)
    .bind(original_path)
    .bind(converted_path)
    .bind(status.as_str())
    .bind(&created_at)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE filename = ?")
        .bind(filename)
        .fetch_one(pool)
        .await
}

pub async fn set_status(
    pool: &DbPool,
    id: &str,
    status: SessionStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Status update inside an open transaction, for commits that must land
/// together with a transcript write.
pub async fn set_status_tx(
    conn: &mut SqliteConnection,
    id: &str,
    status: SessionStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list(
    pool: &DbPool,
    status: Option<SessionStatus>,
    limit: i64,
) -> Result<Vec<SessionRecord>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, SessionRecord>(
                "SELECT * FROM sessions WHERE status = ? ORDER BY created_at DESC LIMIT ?",
            )
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, SessionRecord>(
                "SELECT * FROM sessions ORDER BY created_at DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
        }
    }
}
