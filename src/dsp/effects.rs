//! Derived effects
//!
//! Effects composed from the core operations: peak normalization, phase
//! inversion, silence trimming and stripping, and chunk-dropping speedup.

use crate::engine::{db_to_linear, linear_to_db, AudioBuffer, SilenceOptions, SilenceThreshold};
use crate::error::{AudioSegError, Result};

/// Default chunk length for [`AudioBuffer::speedup`]; 150 ms holds several
/// periods of the lowest audible frequency
pub const SPEEDUP_CHUNK_MS: u64 = 150;

/// Default crossfade between kept chunks in [`AudioBuffer::speedup`]
pub const SPEEDUP_CROSSFADE_MS: u64 = 25;

/// Silence kept at each edge of a gap removed by [`AudioBuffer::strip_silence`]
pub const STRIP_SILENCE_KEEP_MS: u64 = 100;

/// Scan used by [`AudioBuffer::strip_silence`] when the caller has no
/// preference: gaps of a second or more, 20 dB below the clip's average
pub fn strip_silence_options() -> SilenceOptions {
    SilenceOptions {
        min_silence_len_ms: 1000,
        threshold: SilenceThreshold::BelowAverage(20.0),
        seek_step_ms: 1,
    }
}

impl AudioBuffer {
    /// Boost or cut so the peak sits `headroom_db` below full scale
    ///
    /// Digital silence is returned unchanged.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `headroom_db` is not finite
    pub fn normalize(&self, headroom_db: f64) -> Result<AudioBuffer> {
        if !headroom_db.is_finite() {
            return Err(AudioSegError::invalid(format!(
                "headroom must be finite, got {}",
                headroom_db
            )));
        }
        let peak = self.max();
        if peak == 0 {
            return Ok(self.clone());
        }
        let target_peak = self.max_possible_amplitude() * db_to_linear(-headroom_db);
        self.apply_gain(linear_to_db(target_peak / peak as f64))
    }

    /// Negate samples of the selected channels, or of every channel
    ///
    /// The most negative value saturates to the most positive one.
    ///
    /// # Errors
    /// * `InvalidArgument` - if a selected channel is out of range
    pub fn invert_phase(&self, channels: Option<&[usize]>) -> Result<AudioBuffer> {
        let count = self.channels() as usize;
        let mut selected = vec![channels.is_none(); count];
        for &ch in channels.unwrap_or_default() {
            let slot = selected.get_mut(ch).ok_or_else(|| {
                AudioSegError::invalid(format!(
                    "channel {} out of range for {}-channel audio",
                    ch, count
                ))
            })?;
            *slot = true;
        }

        let width = self.sample_width();
        let mut samples = self.samples();
        for frame in samples.chunks_exact_mut(count) {
            for (s, &invert) in frame.iter_mut().zip(&selected) {
                if invert {
                    *s = width.saturate(-(*s as i64));
                }
            }
        }
        Ok(self.spawn_samples(&samples))
    }

    /// Drop leading and trailing audio quieter than `threshold_db`
    ///
    /// Scans `chunk_ms` at a time from each end.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `chunk_ms` is zero
    pub fn trim_silence(&self, threshold_db: f64, chunk_ms: u64) -> Result<AudioBuffer> {
        let len = self.duration_ms();
        let start = self.detect_leading_silence(threshold_db, chunk_ms)?;
        let end = len - self.reverse().detect_leading_silence(threshold_db, chunk_ms)?;
        if start >= end {
            return Ok(self.slice(..0));
        }
        Ok(self.slice(start as i64..end as i64))
    }

    /// Remove every silent gap found by `options`, leaving `keep_ms` of
    /// silence at each edge of the gap
    ///
    /// Gaps inside the clip are closed with a `keep_ms` crossfade, so each
    /// one shrinks to `keep_ms`. A gap at either end of the clip is cut down
    /// to `keep_ms`. `keep_ms` is clamped to half of each gap.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `options` fail validation
    pub fn strip_silence(&self, options: &SilenceOptions, keep_ms: u64) -> Result<AudioBuffer> {
        let spans = self.detect_silence(options)?;
        let mut out = self.clone();

        // Back to front, so earlier positions still line up with `self`
        for span in spans.iter().rev() {
            let keep = keep_ms.min((span.end - span.start) / 2);
            let head_end = (span.start + keep) as i64;
            let tail_start = (span.end - keep) as i64;
            let after = out.duration_ms().saturating_sub(span.end);

            out = if after < keep || span.end >= out.duration_ms() {
                out.slice(..head_end)
            } else if span.start < keep || span.start == 0 {
                out.slice(tail_start..)
            } else {
                let head = out.slice(..head_end);
                let tail = out.slice(tail_start..);
                let crossfade = keep.min(head.duration_ms()).min(tail.duration_ms());
                head.append(&tail, crossfade)?
            };
        }
        Ok(out)
    }

    /// Play back faster without changing pitch
    ///
    /// Removes a slice after every `chunk_ms` and joins the kept chunks with
    /// a `crossfade_ms` crossfade. The final chunk is kept whole.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `playback_speed` is not above 1, `chunk_ms`
    ///   is zero or the clip is too short to yield two chunks
    pub fn speedup(&self, playback_speed: f64, chunk_ms: u64, crossfade_ms: u64) -> Result<AudioBuffer> {
        if playback_speed.is_nan() || playback_speed <= 1.0 || playback_speed.is_infinite() {
            return Err(AudioSegError::invalid(format!(
                "playback speed must be greater than 1, got {}",
                playback_speed
            )));
        }
        if chunk_ms == 0 {
            return Err(AudioSegError::invalid("chunk size must be at least 1 ms"));
        }

        // Share of the audio that is kept
        let keep = 1.0 / playback_speed;
        let (chunk_ms, remove_ms) = if playback_speed < 2.0 {
            (chunk_ms, (chunk_ms as f64 * (1.0 - keep) / keep) as u64)
        } else {
            ((keep * chunk_ms as f64 / (1.0 - keep)) as u64, chunk_ms)
        };
        let crossfade_ms = crossfade_ms.min(remove_ms.saturating_sub(1));

        let mut chunks: Vec<AudioBuffer> = self.chunks(chunk_ms + remove_ms)?.collect();
        if chunks.len() < 2 {
            return Err(AudioSegError::invalid(format!(
                "clip of {:.2}s is too short to speed up {:.1}x with {} ms chunks",
                self.duration_seconds(),
                playback_speed,
                chunk_ms
            )));
        }

        // Trim a little less to make up for the crossfade
        let remove_ms = (remove_ms - crossfade_ms) as i64;
        let last = chunks.pop().unwrap_or_default();
        let mut kept = chunks.iter().map(|c| c.slice(..c.duration_ms() as i64 - remove_ms));

        let first = kept.next().unwrap_or_default();
        let joined = kept.try_fold(first, |out, chunk| out.append(&chunk, crossfade_ms))?;
        joined.concatenate(&last)
    }
}

// ============================================================================
// Tests
// ============================================================================
