//! Locates recordings under the storage root.
//!
//! The ingest tooling drops original uploads under `originals/` and the
//! normalized WAV rendition under `converted/`; transcription prefers the
//! converted file when both exist.

use std::path::{Path, PathBuf};

pub const CONVERTED_DIR: &str = "converted";
pub const ORIGINALS_DIR: &str = "originals";

/// Find a readable local path for `filename`, converted rendition first.
///
/// Returns `None` when the file is in neither location or the name tries
/// to escape the storage root.
pub fn resolve_audio_path(storage_root: &Path, filename: &str) -> Option<PathBuf> {
    if !is_safe_filename(filename) {
        return None;
    }

    let converted = storage_root.join(CONVERTED_DIR).join(filename);
    if converted.is_file() {
        return Some(converted);
    }

    let original = storage_root.join(ORIGINALS_DIR).join(filename);
    if original.is_file() {
        return Some(original);
    }

    None
}

fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
}
