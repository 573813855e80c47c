//! Audio Buffer Storage
//!
//! `AudioBuffer` is the immutable value every operation consumes and
//! produces: interleaved PCM bytes plus the format triple that describes
//! them. The byte storage is reference counted, so cloning a buffer never
//! copies audio.

use std::fmt;
use std::sync::Arc;

use crate::engine::format::{decode_samples, encode_samples, AudioFormat, SampleWidth};
use crate::error::{AudioSegError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to a linear amplitude ratio
///
/// `-inf` maps to `0.0`, which turns any gain stage into digital silence.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear amplitude ratio to decibels
///
/// Returns `f64::NEG_INFINITY` for zero (or negative) input.
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// AudioBuffer
// ============================================================================

/// Immutable interleaved PCM audio
///
/// Samples are frame-major: `[L0, R0, L1, R1, ...]`. The byte length is
/// always an exact multiple of the frame width.
///
/// # Example
/// ```
/// use audioseg::engine::{AudioBuffer, AudioFormat, SampleWidth};
///
/// let format = AudioFormat::new(44100, 2, SampleWidth::Int16).unwrap();
/// let silence = AudioBuffer::silent(1500, format);
/// assert_eq!(silence.duration_ms(), 1500);
/// assert_eq!(silence.frame_count(), 66150);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    data: Arc<[u8]>,
    format: AudioFormat,
}

impl AudioBuffer {
    /// Create a buffer from raw interleaved bytes and a format
    ///
    /// # Errors
    /// * `InvalidArgument` - if the byte length is not a whole number of frames
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Result<Self> {
        let frame_width = format.frame_width();
        if data.len() % frame_width != 0 {
            return Err(AudioSegError::invalid(format!(
                "data length {} is not a multiple of the frame width {}",
                data.len(),
                frame_width
            )));
        }
        Ok(Self {
            data: data.into(),
            format,
        })
    }

    /// Create a buffer from raw bytes and an unvalidated format triple
    ///
    /// This is the contract the codec service satisfies after decoding.
    ///
    /// # Errors
    /// * `UnsupportedSampleWidth` - if `sample_width` is not 1, 2 or 4
    /// * `InvalidArgument` - for a zero rate/channel count or a partial frame
    pub fn from_raw(data: Vec<u8>, frame_rate: u32, channels: u16, sample_width: u16) -> Result<Self> {
        let width = SampleWidth::from_bytes(sample_width)?;
        let format = AudioFormat::new(frame_rate, channels, width)?;
        Self::new(data, format)
    }

    /// Create a buffer from signed interleaved sample values
    ///
    /// Values outside the width's range are clamped.
    ///
    /// # Errors
    /// * `InvalidArgument` - if the sample count is not a whole number of frames
    pub fn from_samples(samples: &[i32], format: AudioFormat) -> Result<Self> {
        if samples.len() % format.channels as usize != 0 {
            return Err(AudioSegError::invalid(format!(
                "sample count {} is not divisible by channel count {}",
                samples.len(),
                format.channels
            )));
        }
        Ok(Self {
            data: encode_samples(format.sample_width, samples).into(),
            format,
        })
    }

    /// Digital silence of the given duration
    pub fn silent(duration_ms: u64, format: AudioFormat) -> Self {
        let frames = (duration_ms as f64 * format.frame_rate as f64 / 1000.0).round() as usize;
        let samples = frames * format.channels as usize;
        let data = format.sample_width.silence().repeat(samples);
        Self {
            data: data.into(),
            format,
        }
    }

    /// Zero-length buffer
    ///
    /// Its format (mono, 8-bit, 1 Hz) is the smallest possible, so
    /// combining it with any other buffer adopts the other buffer's format.
    pub fn empty() -> Self {
        Self {
            data: Arc::from(Vec::new()),
            format: AudioFormat {
                frame_rate: 1,
                channels: 1,
                sample_width: SampleWidth::Int8,
            },
        }
    }

    /// Build a new buffer sharing this buffer's format
    ///
    /// Every transformation funnels its output through here.
    pub(crate) fn spawn(&self, data: Vec<u8>) -> Self {
        Self::spawn_with_format(data, self.format)
    }

    /// Build a new buffer with an explicit format
    pub(crate) fn spawn_with_format(data: Vec<u8>, format: AudioFormat) -> Self {
        debug_assert_eq!(data.len() % format.frame_width(), 0);
        Self {
            data: data.into(),
            format,
        }
    }

    /// Build a new buffer from signed samples in this buffer's format
    pub(crate) fn spawn_samples(&self, samples: &[i32]) -> Self {
        self.spawn(encode_samples(self.format.sample_width, samples))
    }

    // ------------------------------------------------------------------------
    // Format accessors
    // ------------------------------------------------------------------------

    /// Format triple
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Frames per second
    pub fn frame_rate(&self) -> u32 {
        self.format.frame_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// Bytes per sample
    pub fn sample_width(&self) -> SampleWidth {
        self.format.sample_width
    }

    /// Bytes per frame
    pub fn frame_width(&self) -> usize {
        self.format.frame_width()
    }

    /// Full-scale amplitude for this buffer's width
    pub fn max_possible_amplitude(&self) -> f64 {
        self.format.sample_width.max_possible_amplitude()
    }

    // ------------------------------------------------------------------------
    // Data accessors
    // ------------------------------------------------------------------------

    /// Raw interleaved PCM bytes
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Interleaved signed sample values
    ///
    /// 8-bit samples have their storage bias removed.
    pub fn samples(&self) -> Vec<i32> {
        decode_samples(self.format.sample_width, &self.data)
    }

    /// Signed samples of a single channel
    ///
    /// # Errors
    /// * `InvalidArgument` - if `channel` is out of range
    pub fn channel_samples(&self, channel: usize) -> Result<Vec<i32>> {
        let channels = self.channels() as usize;
        if channel >= channels {
            return Err(AudioSegError::invalid(format!(
                "channel {} out of range for {}-channel audio",
                channel, channels
            )));
        }
        Ok(self
            .samples()
            .into_iter()
            .skip(channel)
            .step_by(channels)
            .collect())
    }

    /// Raw bytes of one frame
    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        let width = self.frame_width();
        let start = index.checked_mul(width)?;
        self.data.get(start..start.checked_add(width)?)
    }

    /// Number of whole frames
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.frame_width()
    }

    /// Check if the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length in whole milliseconds, rounded to nearest
    pub fn duration_ms(&self) -> u64 {
        (1000.0 * self.frame_count() as f64 / self.frame_rate() as f64).round() as u64
    }

    /// Exact length in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.frame_rate() as f64
    }

    /// Fractional frame position of a millisecond offset
    pub fn frame_count_for_ms(&self, ms: f64) -> f64 {
        ms * self.frame_rate() as f64 / 1000.0
    }

    /// Frame index of a millisecond offset, rounded and clamped to the buffer
    pub fn frame_index_at_ms(&self, ms: f64) -> usize {
        let index = self.frame_count_for_ms(ms).round();
        if index <= 0.0 {
            0
        } else {
            (index as usize).min(self.frame_count())
        }
    }

    /// Contiguous frame range `[start, end)`, clamped to the buffer
    pub fn frames(&self, start: usize, end: usize) -> AudioBuffer {
        let count = self.frame_count();
        let end = end.min(count);
        let start = start.min(end);
        let width = self.frame_width();
        self.spawn(self.data[start * width..end * width].to_vec())
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("format", &self.format)
            .field("frames", &self.frame_count())
            .field("duration_ms", &self.duration_ms())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
