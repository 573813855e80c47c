//! Format Normalizer
//!
//! Converts buffers between sample widths, channel counts and frame rates,
//! and aligns pairs of buffers to a common format before any binary
//! operation. The common format is the max of each dimension, so the
//! higher-quality side never loses information.
//!
//! Frame-rate conversion uses linear interpolation between neighbouring
//! frames. For a full-scale sinusoid of frequency `f` at source rate `fs`
//! the interpolation error is bounded by `(pi * f / fs)^2 / 2` of full
//! scale, plus one quantisation step. Downsampling applies no anti-alias
//! filter.

use log::debug;

use crate::engine::buffer::AudioBuffer;
use crate::engine::format::{encode_samples, AudioFormat, SampleWidth};
use crate::error::{AudioSegError, Result};

impl AudioBuffer {
    /// Convert to another sample width
    ///
    /// Values are scaled by the power-of-two ratio of the widths. Narrowing
    /// drops the low-order bits and cannot be undone.
    pub fn set_sample_width(&self, width: SampleWidth) -> AudioBuffer {
        let current = self.sample_width();
        if width == current {
            return self.clone();
        }

        let shift = width.bits() as i32 - current.bits() as i32;
        let converted: Vec<i32> = self
            .samples()
            .into_iter()
            .map(|s| {
                let s = s as i64;
                let scaled = if shift > 0 { s << shift } else { s >> -shift };
                width.saturate(scaled)
            })
            .collect();

        let format = AudioFormat {
            sample_width: width,
            ..self.format()
        };
        AudioBuffer::spawn_with_format(encode_samples(width, &converted), format)
    }

    /// Convert to another channel count
    ///
    /// Mono input is duplicated into every output channel. Mono output is
    /// the per-frame average of all input channels. Other conversions may
    /// only add channels: existing channels are kept and the new ones cycle
    /// through the source channels.
    ///
    /// # Errors
    /// * `InvalidArgument` - for zero channels, or narrowing to more than one channel
    pub fn set_channels(&self, channels: u16) -> Result<AudioBuffer> {
        let current = self.channels();
        if channels == 0 {
            return Err(AudioSegError::invalid("channel count must be at least 1"));
        }
        if channels == current {
            return Ok(self.clone());
        }
        if channels > 1 && channels < current {
            return Err(AudioSegError::invalid(format!(
                "cannot reduce {} channels to {}; only downmixing to mono is supported",
                current, channels
            )));
        }

        let width = self.sample_width();
        let src = current as usize;
        let dst = channels as usize;
        let samples = self.samples();
        let mut converted = Vec::with_capacity(self.frame_count() * dst);

        for frame in samples.chunks_exact(src) {
            if dst == 1 {
                let sum: i64 = frame.iter().map(|&s| s as i64).sum();
                converted.push(width.quantize(sum as f64 / src as f64));
            } else {
                converted.extend((0..dst).map(|ch| frame[ch % src]));
            }
        }

        let format = AudioFormat {
            channels,
            ..self.format()
        };
        Ok(AudioBuffer::spawn_with_format(
            encode_samples(width, &converted),
            format,
        ))
    }

    /// Resample to another frame rate, preserving duration
    ///
    /// # Errors
    /// * `InvalidArgument` - if `frame_rate` is zero
    pub fn set_frame_rate(&self, frame_rate: u32) -> Result<AudioBuffer> {
        if frame_rate == 0 {
            return Err(AudioSegError::invalid("frame rate must be positive"));
        }
        let source_rate = self.frame_rate();
        if frame_rate == source_rate {
            return Ok(self.clone());
        }

        let format = AudioFormat {
            frame_rate,
            ..self.format()
        };
        let resampled = resample_linear(
            &self.samples(),
            self.channels() as usize,
            source_rate,
            frame_rate,
            self.sample_width(),
        );
        Ok(AudioBuffer::spawn_with_format(
            encode_samples(self.sample_width(), &resampled),
            format,
        ))
    }

    /// Convert every dimension to `target`
    ///
    /// Width is converted first so resampling happens at the higher
    /// precision.
    pub fn set_format(&self, target: AudioFormat) -> Result<AudioBuffer> {
        if self.format() == target {
            return Ok(self.clone());
        }
        debug!("normalizing {} -> {}", self.format(), target);
        self.set_sample_width(target.sample_width)
            .set_channels(target.channels)?
            .set_frame_rate(target.frame_rate)
    }

    /// Split into one mono buffer per channel
    pub fn split_to_mono(&self) -> Vec<AudioBuffer> {
        let channels = self.channels() as usize;
        if channels == 1 {
            return vec![self.clone()];
        }

        let samples = self.samples();
        let format = AudioFormat {
            channels: 1,
            ..self.format()
        };
        (0..channels)
            .map(|ch| {
                let mono: Vec<i32> = samples.iter().skip(ch).step_by(channels).copied().collect();
                AudioBuffer::spawn_with_format(encode_samples(format.sample_width, &mono), format)
            })
            .collect()
    }

    /// Interleave mono buffers into one multi-channel buffer
    ///
    /// Inputs are first aligned to a common frame rate and sample width.
    /// Shorter inputs are padded with silence to the longest.
    ///
    /// # Errors
    /// * `InvalidArgument` - if no buffers are given or any input is not mono
    pub fn from_mono_channels(channels: &[AudioBuffer]) -> Result<AudioBuffer> {
        let first = channels
            .first()
            .ok_or_else(|| AudioSegError::invalid("at least one mono buffer is required"))?;
        if let Some(pos) = channels.iter().position(|c| c.channels() != 1) {
            return Err(AudioSegError::invalid(format!(
                "buffer {} has {} channels; all inputs must be mono",
                pos,
                channels[pos].channels()
            )));
        }
        let count = u16::try_from(channels.len())
            .map_err(|_| AudioSegError::invalid("too many channels"))?;

        let target = channels
            .iter()
            .fold(first.format(), |acc, c| acc.common(&c.format()));
        let aligned = channels
            .iter()
            .map(|c| c.set_format(target).map(|c| c.samples()))
            .collect::<Result<Vec<_>>>()?;

        let frames = aligned.iter().map(Vec::len).max().unwrap_or(0);
        let mut interleaved = Vec::with_capacity(frames * aligned.len());
        for i in 0..frames {
            interleaved.extend(aligned.iter().map(|c| c.get(i).copied().unwrap_or(0)));
        }

        let format = AudioFormat {
            channels: count,
            ..target
        };
        AudioBuffer::from_samples(&interleaved, format)
    }
}

/// Align two buffers to their common format
///
/// # Errors
/// * `FormatMismatch` - if conversion did not reach the common format
pub fn sync(a: &AudioBuffer, b: &AudioBuffer) -> Result<(AudioBuffer, AudioBuffer)> {
    let target = a.format().common(&b.format());
    let a = a.set_format(target)?;
    let b = b.set_format(target)?;
    if a.format() != b.format() {
        return Err(AudioSegError::FormatMismatch {
            expected: a.format().to_string(),
            found: b.format().to_string(),
        });
    }
    Ok((a, b))
}

/// Linear interpolation resampling of interleaved samples
fn resample_linear(
    samples: &[i32],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
    width: SampleWidth,
) -> Vec<i32> {
    let source_frames = samples.len() / channels;
    if source_frames == 0 {
        return Vec::new();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let target_frames = (source_frames as f64 / ratio).round() as usize;
    let mut output = Vec::with_capacity(target_frames * channels);

    for i in 0..target_frames {
        // Map output frame to source position
        let src_pos = i as f64 * ratio;
        let src_idx = (src_pos.floor() as usize).min(source_frames - 1);
        let next_idx = (src_idx + 1).min(source_frames - 1);
        let frac = src_pos - src_idx as f64;

        for ch in 0..channels {
            let a = samples[src_idx * channels + ch] as f64;
            let b = samples[next_idx * channels + ch] as f64;
            output.push(width.quantize(a + (b - a) * frac));
        }
    }

    output
}
