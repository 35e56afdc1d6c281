use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::stt::whisper::WhisperModel;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Runtime settings, read from the environment with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Root directory holding `originals/` and `converted/` audio files.
    pub storage_root: PathBuf,
    pub models_dir: PathBuf,
    pub model: WhisperModel,
    /// Fixed transcription language; the recordings are Norwegian.
    pub language: String,
    pub chunk_secs: f64,
    pub overlap_secs: f64,
    pub dedup_window: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env_or("DATABASE_URL", "sqlite:data/transkriv.db?mode=rwc"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000"),
            storage_root: PathBuf::from(env_or("AUDIO_STORAGE_PATH", "audio_files")),
            models_dir: PathBuf::from(env_or("MODELS_DIR", "models/whisper")),
            model: parse_env("WHISPER_MODEL", WhisperModel::Small)?,
            language: env_or("TRANSCRIBE_LANGUAGE", "no"),
            chunk_secs: parse_env("CHUNK_SECONDS", 30.0)?,
            overlap_secs: parse_env("OVERLAP_SECONDS", 1.0)?,
            dedup_window: parse_env("DEDUP_WINDOW_WORDS", 3)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
