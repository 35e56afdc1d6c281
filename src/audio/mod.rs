pub mod chunk;
pub mod decode;

pub use chunk::{AudioChunk, ChunkError, ChunkPlan};
pub use decode::{load_audio, AudioBuffer, DecodeError};
