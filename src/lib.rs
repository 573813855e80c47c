//! audioseg - immutable PCM audio segments
//!
//! An [`AudioBuffer`] is an immutable block of interleaved PCM samples plus
//! its format. Every operation reads its inputs and returns a new buffer,
//! so buffers can be shared freely between threads.
//!
//! # Architecture
//!
//! - `engine`: the buffer model and its sample-accurate operations
//!   (slicing, gain, fades, mixing, analysis, silence detection)
//! - `dsp`: effects built only from engine operations
//! - `codec`: the boundary to WAV files and the external converter
//! - `config`: settings handed to the codec boundary and the CLI
//!
//! # Example
//! ```
//! use audioseg::{AudioBuffer, AudioFormat, Overlay};
//!
//! let bed = AudioBuffer::silent(2000, AudioFormat::default());
//! let click = AudioBuffer::silent(50, AudioFormat::cd_quality());
//! let mixed = bed.overlay(&click, Overlay::at(500).times(3)).unwrap();
//! assert_eq!(mixed.duration_ms(), 2000);
//! assert_eq!(mixed.format(), AudioFormat::cd_quality());
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use codec::{AudioCodec, CodecService, ConverterCodec, DecodeHint, ExportOptions, WavCodec};
pub use config::Config;
pub use dsp::{CompressorParams, FilterType};
pub use engine::{
    AudioBuffer, AudioFormat, Fade, KeepSilence, Overlay, SampleWidth, SilenceOptions, SilenceThreshold,
};
pub use error::{AudioSegError, Result};
