//! DSP Effects Library
//!
//! Effects built on top of the engine's core operations. Each one is an
//! inherent method on `AudioBuffer` that returns a new buffer.

mod compressor;
mod effects;
mod filter;

pub use compressor::CompressorParams;
pub use effects::{strip_silence_options, SPEEDUP_CHUNK_MS, SPEEDUP_CROSSFADE_MS, STRIP_SILENCE_KEEP_MS};
pub use filter::FilterType;
