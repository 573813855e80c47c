//! Mixing Engine
//!
//! Layered mixing (overlay) and crossfaded append. Both normalize their
//! operands to a common format first; sample addition saturates.

use log::debug;

use crate::engine::buffer::{db_to_linear, AudioBuffer};
use crate::engine::normalize::sync;
use crate::engine::segment::check_gain;
use crate::error::{AudioSegError, Result};

/// How a layer is placed onto a base buffer
///
/// `times` takes precedence over `looped`. With neither set the layer
/// plays once.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Overlay {
    /// Offset into the base where the layer starts
    pub position_ms: u64,
    /// Gain applied to the base while the layer plays over it
    pub gain_during_overlay_db: Option<f64>,
    /// Repeat the layer until the base ends
    pub looped: bool,
    /// Play the layer exactly this many times (truncated to the base)
    pub times: Option<u32>,
}

impl Overlay {
    /// Play the layer once starting at `position_ms`
    pub fn at(position_ms: u64) -> Self {
        Self {
            position_ms,
            ..Self::default()
        }
    }

    /// Repeat the layer until the base ends
    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    /// Play the layer `times` times, overriding `looped`
    pub fn times(mut self, times: u32) -> Self {
        self.times = Some(times);
        self
    }

    /// Duck the base by `db` under the layer
    pub fn gain_during_overlay(mut self, db: f64) -> Self {
        self.gain_during_overlay_db = Some(db);
        self
    }

    /// Number of passes, or `None` for "until the base ends"
    fn repeats(&self) -> Option<u32> {
        match (self.times, self.looped) {
            (Some(n), _) => Some(n),
            (None, true) => None,
            (None, false) => Some(1),
        }
    }
}

impl AudioBuffer {
    /// Mix `layer` onto this buffer
    ///
    /// The result always has this buffer's length; a layer running past
    /// the end is cut off.
    ///
    /// # Errors
    /// * `InvalidArgument` - if the ducking gain is `NaN` or `+inf`
    ///
    /// # Example
    /// ```
    /// use audioseg::engine::{AudioBuffer, AudioFormat, Overlay};
    ///
    /// let bed = AudioBuffer::silent(2000, AudioFormat::default());
    /// let blip = AudioBuffer::silent(300, AudioFormat::default());
    /// let mixed = bed.overlay(&blip, Overlay::at(500).looped()).unwrap();
    /// assert_eq!(mixed.frame_count(), bed.frame_count());
    /// ```
    pub fn overlay(&self, layer: &AudioBuffer, overlay: Overlay) -> Result<AudioBuffer> {
        if let Some(db) = overlay.gain_during_overlay_db {
            check_gain("gain during overlay", db)?;
        }

        let (base, layer) = sync(self, layer)?;
        let repeats = overlay.repeats();
        if layer.is_empty() || repeats == Some(0) {
            return Ok(base);
        }

        let width = base.sample_width();
        let channels = base.channels() as usize;
        let ducking = overlay.gain_during_overlay_db.map(db_to_linear);
        let layer_samples = layer.samples();
        let mut samples = base.samples();

        let mut pos = base.frame_index_at_ms(overlay.position_ms as f64) * channels;
        let mut passes = 0u32;
        while pos < samples.len() {
            let end = (pos + layer_samples.len()).min(samples.len());
            for (s, &l) in samples[pos..end].iter_mut().zip(&layer_samples) {
                let under = match ducking {
                    Some(factor) => width.quantize(*s as f64 * factor),
                    None => *s,
                };
                *s = width.saturate(under as i64 + l as i64);
            }
            pos = end;
            passes += 1;
            if repeats.is_some_and(|n| passes >= n) {
                break;
            }
        }

        debug!(
            "overlay: {} pass(es) of {} frames onto {} frames",
            passes,
            layer.frame_count(),
            base.frame_count()
        );
        Ok(base.spawn_samples(&samples))
    }

    /// Append `other`, blending the joint over `crossfade_ms`
    ///
    /// A zero crossfade is plain concatenation. Otherwise the result has
    /// `frames(self) + frames(other) - crossfade_frames` frames.
    ///
    /// # Errors
    /// * `InvalidArgument` - if the crossfade is longer than either operand
    pub fn append(&self, other: &AudioBuffer, crossfade_ms: u64) -> Result<AudioBuffer> {
        if crossfade_ms == 0 {
            return self.concatenate(other);
        }

        let shorter = self.duration_ms().min(other.duration_ms());
        if crossfade_ms > shorter {
            return Err(AudioSegError::invalid(format!(
                "crossfade of {} ms is longer than the shorter clip ({} ms)",
                crossfade_ms, shorter
            )));
        }

        let (a, b) = sync(self, other)?;
        let cf_frames = a
            .frame_index_at_ms(crossfade_ms as f64)
            .min(b.frame_count());
        let split = a.frame_count() - cf_frames;

        let faded_out = a.frames(split, a.frame_count()).ramp(0, cf_frames, 1.0, 0.0);
        let faded_in = b.frames(0, cf_frames).ramp(0, cf_frames, 0.0, 1.0);
        let blended = faded_out.overlay(&faded_in, Overlay::default())?;

        let head = a.frames(0, split);
        let tail = b.frames(cf_frames, b.frame_count());
        let mut data =
            Vec::with_capacity(head.raw_data().len() + blended.raw_data().len() + tail.raw_data().len());
        data.extend_from_slice(head.raw_data());
        data.extend_from_slice(blended.raw_data());
        data.extend_from_slice(tail.raw_data());
        Ok(a.spawn(data))
    }
}
