//! PCM format descriptors and the integer sample codec
//!
//! Widths 2 and 4 are little-endian signed integers. Width 1 is stored
//! offset-binary (unsigned, silence = 0x80) but always surfaces as a signed
//! value, so every transformation works on one signed representation.

use std::fmt;

use num_traits::clamp;
use serde::{Deserialize, Serialize};

use crate::error::{AudioSegError, Result};

/// Bias applied to 8-bit samples on disk and in memory
const INT8_BIAS: i32 = 128;

/// Bytes per individual channel sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum SampleWidth {
    /// 8-bit, offset-binary
    Int8,
    /// 16-bit signed
    Int16,
    /// 32-bit signed
    Int32,
}

impl SampleWidth {
    /// Map a byte count to a sample width
    ///
    /// # Errors
    /// * `UnsupportedSampleWidth` - for anything other than 1, 2 or 4
    pub fn from_bytes(width: u16) -> Result<Self> {
        match width {
            1 => Ok(SampleWidth::Int8),
            2 => Ok(SampleWidth::Int16),
            4 => Ok(SampleWidth::Int32),
            _ => Err(AudioSegError::UnsupportedSampleWidth { width }),
        }
    }

    /// Bytes per sample
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            SampleWidth::Int8 => 1,
            SampleWidth::Int16 => 2,
            SampleWidth::Int32 => 4,
        }
    }

    /// Bits per sample
    #[inline]
    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Smallest representable signed sample value
    #[inline]
    pub fn min_value(self) -> i64 {
        -(1_i64 << (self.bits() - 1))
    }

    /// Largest representable signed sample value
    #[inline]
    pub fn max_value(self) -> i64 {
        (1_i64 << (self.bits() - 1)) - 1
    }

    /// Full-scale reference used for dBFS: `2^(bits - 1)`
    #[inline]
    pub fn max_possible_amplitude(self) -> f64 {
        (1_u64 << (self.bits() - 1)) as f64
    }

    /// Saturate a wide integer into this width's range
    #[inline]
    pub fn saturate(self, value: i64) -> i32 {
        clamp(value, self.min_value(), self.max_value()) as i32
    }

    /// Round a float to the nearest sample value, saturating on overflow
    #[inline]
    pub fn quantize(self, value: f64) -> i32 {
        clamp(value.round(), self.min_value() as f64, self.max_value() as f64) as i32
    }

    /// Decode one sample from exactly `self.bytes()` bytes
    #[inline]
    pub fn read(self, bytes: &[u8]) -> i32 {
        match self {
            SampleWidth::Int8 => bytes[0] as i32 - INT8_BIAS,
            SampleWidth::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            SampleWidth::Int32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Encode one sample, saturating values outside the width's range
    #[inline]
    pub fn write(self, value: i32, out: &mut Vec<u8>) {
        let value = self.saturate(value as i64);
        match self {
            SampleWidth::Int8 => out.push((value + INT8_BIAS) as u8),
            SampleWidth::Int16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            SampleWidth::Int32 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Byte pattern of one silent sample
    pub fn silence(self) -> &'static [u8] {
        match self {
            SampleWidth::Int8 => &[0x80],
            SampleWidth::Int16 => &[0, 0],
            SampleWidth::Int32 => &[0, 0, 0, 0],
        }
    }
}

impl TryFrom<u16> for SampleWidth {
    type Error = AudioSegError;

    fn try_from(width: u16) -> Result<Self> {
        SampleWidth::from_bytes(width)
    }
}

impl From<SampleWidth> for u16 {
    fn from(width: SampleWidth) -> u16 {
        width.bytes() as u16
    }
}

/// Decode interleaved bytes into signed sample values
pub fn decode_samples(width: SampleWidth, data: &[u8]) -> Vec<i32> {
    data.chunks_exact(width.bytes())
        .map(|bytes| width.read(bytes))
        .collect()
}

/// Encode signed sample values, saturating each one
pub fn encode_samples(width: SampleWidth, samples: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * width.bytes());
    for &sample in samples {
        width.write(sample, &mut out);
    }
    out
}

/// Format triple shared by every sample in a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Frames per second
    pub frame_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Bytes per sample
    pub sample_width: SampleWidth,
}

impl AudioFormat {
    /// Create a validated format
    ///
    /// # Errors
    /// * `InvalidArgument` - if `frame_rate` or `channels` is zero
    pub fn new(frame_rate: u32, channels: u16, sample_width: SampleWidth) -> Result<Self> {
        if frame_rate == 0 {
            return Err(AudioSegError::invalid("frame rate must be positive"));
        }
        if channels == 0 {
            return Err(AudioSegError::invalid("channel count must be at least 1"));
        }
        Ok(Self {
            frame_rate,
            channels,
            sample_width,
        })
    }

    /// CD quality: 44.1kHz, stereo, 16-bit
    pub fn cd_quality() -> Self {
        Self {
            frame_rate: 44100,
            channels: 2,
            sample_width: SampleWidth::Int16,
        }
    }

    /// Bytes per frame (`channels * sample_width`)
    #[inline]
    pub fn frame_width(&self) -> usize {
        self.channels as usize * self.sample_width.bytes()
    }

    /// Target format for combining two buffers: the max of each dimension
    pub fn common(&self, other: &AudioFormat) -> AudioFormat {
        AudioFormat {
            frame_rate: self.frame_rate.max(other.frame_rate),
            channels: self.channels.max(other.channels),
            sample_width: self.sample_width.max(other.sample_width),
        }
    }
}

impl Default for AudioFormat {
    /// Mono 16-bit at 11025 Hz
    fn default() -> Self {
        Self {
            frame_rate: 11025,
            channels: 1,
            sample_width: SampleWidth::Int16,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit",
            self.frame_rate,
            self.channels,
            self.sample_width.bits()
        )
    }
}
