//! Audio Engine Module
//!
//! The in-memory audio model and its transformations:
//! - Buffer storage and format arithmetic
//! - Format normalization between buffers
//! - Segment algebra, mixing, analysis and silence detection
//! - Signal generators and the WAV boundary adapter

pub mod analysis;
pub mod buffer;
pub mod format;
pub mod generators;
pub mod io;
pub mod mixing;
pub mod normalize;
pub mod segment;
pub mod silence;

pub use buffer::{db_to_linear, linear_to_db, AudioBuffer};
pub use format::{AudioFormat, SampleWidth};
pub use generators::{SignalGenerator, Waveform};
pub use io::{from_wav_bytes, read_wav, read_wav_file, to_wav_bytes, write_wav, write_wav_file};
pub use mixing::Overlay;
pub use normalize::sync;
pub use segment::{concat_all, Chunks, Fade, DEFAULT_CROSSFADE_MS};
pub use silence::{KeepSilence, SilenceOptions, SilenceThreshold};
