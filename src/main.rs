use anyhow::Context as _;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dotenvy::dotenv;

mod api;
mod audio;
mod config;
mod db;
mod files;
mod sessions;
mod stt;

use config::Config;
use sessions::SessionService;
use stt::pipeline::{PipelineConfig, TranscriptionPipeline};
use stt::whisper::{WhisperBackend, WHISPER_SAMPLE_RATE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to read configuration")?;

    let db_pool = db::init_db(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized successfully");

    std::fs::create_dir_all(config.storage_root.join(files::ORIGINALS_DIR)).ok();
    std::fs::create_dir_all(config.storage_root.join(files::CONVERTED_DIR)).ok();
    std::fs::create_dir_all(&config.models_dir).ok();

    let backend = WhisperBackend::new(config.model, config.models_dir.clone());
    let pipeline = Arc::new(
        TranscriptionPipeline::new(
            Box::new(backend),
            PipelineConfig {
                sample_rate: WHISPER_SAMPLE_RATE,
                chunk_secs: config.chunk_secs,
                overlap_secs: config.overlap_secs,
                dedup_window: config.dedup_window,
                language: config.language.clone(),
            },
        )
        .context("Invalid chunking configuration")?,
    );
    info!(
        "Transcription pipeline ready (model {}, language {})",
        pipeline.model_id(),
        config.language
    );

    let service = Arc::new(SessionService::new(
        db_pool.clone(),
        Arc::clone(&pipeline),
        config.storage_root.clone(),
    ));

    let state = api::AppState {
        db: db_pool,
        service,
        config: Arc::new(config.clone()),
    };

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
