//! Combines per-chunk transcripts into one coherent text stream.
//!
//! Consecutive chunks share an overlap region, so the model tends to emit
//! the same words at the tail of one chunk and the head of the next. The
//! stitcher drops the repeated words at each boundary and assembles the
//! final text plus the timestamped segment list.

use super::TranscriptSegment;

/// Number of boundary words compared by default.
pub const DEFAULT_DEDUP_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct StitchConfig {
    /// How many trailing/leading words to compare at a chunk boundary.
    pub dedup_window: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

/// Accumulates chunk transcripts in order and removes boundary duplicates.
pub struct Stitcher {
    config: StitchConfig,
    parts: Vec<String>,
    segments: Vec<TranscriptSegment>,
}

impl Stitcher {
    pub fn new(config: StitchConfig) -> Self {
        Self {
            config,
            parts: Vec::new(),
            segments: Vec::new(),
        }
    }

    /// Add the next chunk's transcript.
    ///
    /// Whitespace-only chunks contribute nothing, as do chunks whose whole
    /// text was a repeat of the previous boundary. The segment keeps the
    /// chunk's original time range even when words were trimmed.
    pub fn push_chunk(&mut self, text: &str, start_secs: f64, end_secs: f64) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let accepted = match self.parts.last() {
            Some(prev) => trim_boundary_repeat(prev, text, self.config.dedup_window),
            None => text.to_string(),
        };

        if accepted.trim().is_empty() {
            return;
        }

        self.segments.push(TranscriptSegment {
            text: accepted.clone(),
            start_time: start_secs,
            end_time: end_secs,
            confidence: None,
        });
        self.parts.push(accepted);
    }

    /// Finish stitching, returning the full text and the segment list.
    pub fn finish(self) -> (String, Vec<TranscriptSegment>) {
        let full_text = self.parts.join(" ").trim().to_string();
        (full_text, self.segments)
    }
}

/// Drop words at the head of `next` that repeat the tail of `prev`.
///
/// Compares up to `window` words, preferring the longest matching run.
/// Word runs must match exactly; when nothing matches, `next` is returned
/// unchanged so a mismatched boundary costs a short duplication instead of
/// lost text.
fn trim_boundary_repeat(prev: &str, next: &str, window: usize) -> String {
    let prev_words: Vec<&str> = prev.split_whitespace().collect();
    let next_words: Vec<&str> = next.split_whitespace().collect();

    let max_run = window.min(prev_words.len()).min(next_words.len());
    for run in (1..=max_run).rev() {
        if prev_words[prev_words.len() - run..] == next_words[..run] {
            return next_words[run..].join(" ");
        }
    }

    next.to_string()
}
