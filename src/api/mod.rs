//! Thin REST layer over the session service.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::config::Config;
use crate::db::sessions::{self, SessionStatus};
use crate::db::transcripts;
use crate::db::DbPool;
use crate::sessions::{RequestError, SessionService};

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub service: Arc<SessionService>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/transcription/transcribe/{filename}",
            post(transcribe),
        )
        .route("/api/v1/transcription/status", get(transcription_status))
        .route("/api/v1/transcription/models", get(available_models))
        .route("/api/v1/sessions", get(list_sessions))
        .route("/api/v1/sessions/{id}", get(session_detail))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn transcribe(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.service.request_transcription(&filename).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(RequestError::NotFound(filename)) => error_response(
            StatusCode::NOT_FOUND,
            format!("Audio file not found: {}", filename),
        ),
        Err(e @ RequestError::Persistence(_)) => {
            error!("Transcription request failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn transcription_status(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = state.service.pipeline().status();
    let database_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    Json(json!({
        "status": if database_ok { "ready" } else { "not_ready" },
        "model_info": pipeline,
        "dependencies": {
            "database": database_ok,
        },
    }))
}

async fn available_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "current_model": state.service.pipeline().model_id(),
        "language": state.config.language,
        "description": "Local whisper.cpp model for long-form interview recordings",
        "features": [
            "Chunked processing for long recordings",
            "Timestamped segments",
            "Overlap handling",
        ],
    }))
}

#[derive(Debug, Deserialize)]
struct SessionsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Response {
    let status = match query.status.as_deref() {
        Some(raw) => match raw.parse::<SessionStatus>() {
            Ok(status) => Some(status),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000);

    match sessions::list(&state.db, status, limit).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("Failed to list sessions: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn session_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session = match sessions::find_by_id(&state.db, &id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, format!("Session not found: {}", id))
        }
        Err(e) => {
            error!("Failed to load session {}: {}", id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let transcript = match transcripts::find_by_session(&state.db, &session.id).await {
        Ok(transcript) => transcript,
        Err(e) => {
            error!("Failed to load transcript for {}: {}", id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let transcript_json = transcript.map(|t| {
        json!({
            "full_text": t.full_text,
            "segments": t.decode_segments(),
            "language": t.language,
            "model_version": t.model_version,
            "processing_duration_ms": t.processing_duration_ms,
            "created_at": t.created_at,
        })
    });

    Json(json!({
        "id": session.id,
        "filename": session.filename,
        "status": session.status,
        "original_path": session.original_path,
        "converted_path": session.converted_path,
        "created_at": session.created_at,
        "transcript": transcript_json,
    }))
    .into_response()
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}
