pub mod backend;
pub mod pipeline;
pub mod stitch;
pub mod whisper;

use serde::{Deserialize, Serialize};

/// One reconciled unit of transcript output.
///
/// Times are chunk bounds in seconds relative to the whole recording;
/// reconciliation trims duplicated words but never the time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}
