//! Segment Algebra
//!
//! Slicing, concatenation, repetition, gain, panning, reversal and fades.
//! Every operation reads its inputs and returns a fresh buffer.
//!
//! Slicing is millisecond based. A stepped slice does not stride over
//! individual samples: it partitions the selected range into consecutive
//! chunks of `step_ms` (see [`AudioBuffer::slice_step`]).

use std::ops::{Bound, RangeBounds};

use crate::engine::buffer::{db_to_linear, linear_to_db, AudioBuffer};
use crate::engine::normalize::sync;
use crate::error::{AudioSegError, Result};

/// Crossfade applied by [`AudioBuffer::append`] callers that want the
/// conventional join
pub const DEFAULT_CROSSFADE_MS: u64 = 100;

/// Reject gains that cannot be applied (`NaN`, `+inf`)
///
/// `-inf` is allowed and silences the audio.
pub(crate) fn check_gain(name: &str, db: f64) -> Result<()> {
    if db.is_nan() || db == f64::INFINITY {
        return Err(AudioSegError::invalid(format!("{} must be finite or -inf, got {}", name, db)));
    }
    Ok(())
}

impl AudioBuffer {
    /// Frame index for a millisecond boundary; the clip length maps to the last frame
    pub(crate) fn boundary_frame(&self, ms: i64) -> usize {
        if ms >= self.duration_ms() as i64 {
            self.frame_count()
        } else {
            self.frame_index_at_ms(ms as f64)
        }
    }

    /// Resolve a possibly negative millisecond position against the clip length
    pub(crate) fn resolve_ms(&self, ms: i64) -> i64 {
        let len = self.duration_ms() as i64;
        if ms < 0 {
            (len + ms).max(0)
        } else {
            ms.min(len)
        }
    }

    /// Multiply every sample by a linear factor, saturating
    pub(crate) fn scale(&self, factor: f64) -> AudioBuffer {
        if factor == 1.0 {
            return self.clone();
        }
        let width = self.sample_width();
        let scaled: Vec<i32> = self
            .samples()
            .into_iter()
            .map(|s| width.quantize(s as f64 * factor))
            .collect();
        self.spawn_samples(&scaled)
    }

    /// Apply a linear gain ramp over frames `[start, end)`
    ///
    /// Frames before `start` are held at `from`, frames from `end` on at `to`.
    pub(crate) fn ramp(&self, start: usize, end: usize, from: f64, to: f64) -> AudioBuffer {
        let channels = self.channels() as usize;
        let width = self.sample_width();
        let span = end.saturating_sub(start);
        let step = if span > 0 { (to - from) / span as f64 } else { 0.0 };

        let mut samples = self.samples();
        for (i, frame) in samples.chunks_exact_mut(channels).enumerate() {
            let factor = if i < start {
                from
            } else if i < end {
                from + step * (i - start) as f64
            } else {
                to
            };
            if factor != 1.0 {
                for s in frame.iter_mut() {
                    *s = width.quantize(*s as f64 * factor);
                }
            }
        }
        self.spawn_samples(&samples)
    }

    // ------------------------------------------------------------------------
    // Slicing
    // ------------------------------------------------------------------------

    /// Millisecond slice
    ///
    /// Negative bounds count back from the end; bounds are clamped to the
    /// clip, so slicing past the end is not an error.
    ///
    /// # Example
    /// ```
    /// use audioseg::engine::{AudioBuffer, AudioFormat};
    ///
    /// let clip = AudioBuffer::silent(3000, AudioFormat::default());
    /// assert_eq!(clip.slice(..1000).duration_ms(), 1000);
    /// assert_eq!(clip.slice(-500..).duration_ms(), 500);
    /// assert_eq!(clip.slice(2500..9000).duration_ms(), 500);
    /// ```
    pub fn slice<R: RangeBounds<i64>>(&self, range: R) -> AudioBuffer {
        let start = match range.start_bound() {
            Bound::Included(&ms) => self.resolve_ms(ms),
            Bound::Excluded(&ms) => self.resolve_ms(ms).saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&ms) => self.resolve_ms(ms).saturating_add(1),
            Bound::Excluded(&ms) => self.resolve_ms(ms),
            Bound::Unbounded => i64::MAX,
        };
        let start_frame = self.boundary_frame(start);
        let end_frame = self.boundary_frame(end);
        self.frames(start_frame, end_frame.max(start_frame))
    }

    /// Consecutive chunks of `step_ms`, the last possibly shorter
    ///
    /// # Errors
    /// * `InvalidArgument` - if `step_ms` is zero
    pub fn chunks(&self, step_ms: u64) -> Result<Chunks> {
        if step_ms == 0 {
            return Err(AudioSegError::invalid("chunk step must be at least 1 ms"));
        }
        let len = self.duration_ms();
        Ok(Chunks {
            buffer: self.clone(),
            step_ms,
            index: 0,
            count: len.div_ceil(step_ms) as usize,
        })
    }

    /// Slice a range, then partition it into chunks of `step_ms`
    ///
    /// # Errors
    /// * `InvalidArgument` - if `step_ms` is zero
    pub fn slice_step<R: RangeBounds<i64>>(&self, range: R, step_ms: u64) -> Result<Chunks> {
        self.slice(range).chunks(step_ms)
    }

    // ------------------------------------------------------------------------
    // Concatenation
    // ------------------------------------------------------------------------

    /// Join two buffers end to end after aligning their formats
    ///
    /// # Errors
    /// * `FormatMismatch` - if normalization failed to align the formats
    pub fn concatenate(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        let (a, b) = sync(self, other)?;
        let mut data = Vec::with_capacity(a.raw_data().len() + b.raw_data().len());
        data.extend_from_slice(a.raw_data());
        data.extend_from_slice(b.raw_data());
        Ok(a.spawn(data))
    }

    /// Concatenate `n` copies of this buffer
    ///
    /// # Errors
    /// * `InvalidArgument` - if `n` is zero
    pub fn repeat(&self, n: usize) -> Result<AudioBuffer> {
        if n < 1 {
            return Err(AudioSegError::invalid("repeat count must be at least 1"));
        }
        Ok(self.spawn(self.raw_data().repeat(n)))
    }

    // ------------------------------------------------------------------------
    // Gain
    // ------------------------------------------------------------------------

    /// Change the volume by `db` decibels
    ///
    /// Samples that overflow are clipped to the width's range.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `db` is `NaN` or `+inf`
    pub fn apply_gain(&self, db: f64) -> Result<AudioBuffer> {
        check_gain("gain", db)?;
        Ok(self.scale(db_to_linear(db)))
    }

    /// Change the volume of the left and right channels independently
    ///
    /// Mono input is duplicated to stereo first.
    ///
    /// # Errors
    /// * `InvalidArgument` - for unusable gains or more than two channels
    pub fn apply_gain_stereo(&self, left_db: f64, right_db: f64) -> Result<AudioBuffer> {
        check_gain("left gain", left_db)?;
        check_gain("right gain", right_db)?;
        if self.channels() > 2 {
            return Err(AudioSegError::invalid(format!(
                "stereo gain needs mono or stereo input, got {} channels",
                self.channels()
            )));
        }

        let stereo = self.set_channels(2)?;
        let factors = [db_to_linear(left_db), db_to_linear(right_db)];
        let width = stereo.sample_width();
        let mut samples = stereo.samples();
        for frame in samples.chunks_exact_mut(2) {
            for (s, factor) in frame.iter_mut().zip(factors) {
                *s = width.quantize(*s as f64 * factor);
            }
        }
        Ok(stereo.spawn_samples(&samples))
    }

    /// Pan across the stereo field
    ///
    /// `-1.0` is hard left and `1.0` hard right: the opposite channel goes
    /// silent and the active one gains 3 dB. `0.0` leaves the audio as is.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `amount` is outside `[-1, 1]`
    pub fn pan(&self, amount: f64) -> Result<AudioBuffer> {
        if !(-1.0..=1.0).contains(&amount) {
            return Err(AudioSegError::invalid(format!(
                "pan amount must be within [-1, 1], got {}",
                amount
            )));
        }

        let max_boost_db = linear_to_db(2.0);
        let boost_db = amount.abs() * max_boost_db;
        let reduce_db = linear_to_db(db_to_linear(max_boost_db) - db_to_linear(boost_db));
        // Two speakers do not sum to a full 6 dB
        let boost_db = boost_db / 2.0;

        if amount < 0.0 {
            self.apply_gain_stereo(boost_db, reduce_db)
        } else {
            self.apply_gain_stereo(reduce_db, boost_db)
        }
    }

    // ------------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------------

    /// Flip frame order; samples within a frame keep their channel order
    pub fn reverse(&self) -> AudioBuffer {
        let data: Vec<u8> = self
            .raw_data()
            .chunks_exact(self.frame_width())
            .rev()
            .flatten()
            .copied()
            .collect();
        self.spawn(data)
    }

    /// Ramp the volume between two gains
    ///
    /// # Errors
    /// * `InvalidArgument` - for an over-specified fade, a negative duration,
    ///   an unusable gain or an end before the start
    pub fn fade(&self, fade: Fade) -> Result<AudioBuffer> {
        if fade.start.is_some() && fade.end.is_some() && fade.duration.is_some() {
            return Err(AudioSegError::invalid(
                "only two of start, end and duration may be specified",
            ));
        }
        if let Some(duration) = fade.duration {
            if duration < 0 {
                return Err(AudioSegError::invalid("fade duration must not be negative"));
            }
        }
        check_gain("from gain", fade.from_gain)?;
        check_gain("to gain", fade.to_gain)?;

        if fade.from_gain == 0.0 && fade.to_gain == 0.0 {
            return Ok(self.clone());
        }

        let len = self.duration_ms() as i64;
        let start = fade.start.map(|ms| self.resolve_ms(ms));
        let end = fade.end.map(|ms| self.resolve_ms(ms));
        let (start, end) = match (fade.duration, start, end) {
            (Some(d), Some(s), _) => (s, s.saturating_add(d).min(len)),
            (Some(d), None, Some(e)) => ((e - d).max(0), e),
            (Some(d), None, None) => (0, d.min(len)),
            (None, s, e) => (s.unwrap_or(0), e.unwrap_or(len)),
        };
        if end < start {
            return Err(AudioSegError::invalid(format!(
                "fade end ({} ms) is before its start ({} ms)",
                end, start
            )));
        }

        Ok(self.ramp(
            self.boundary_frame(start),
            self.boundary_frame(end),
            db_to_linear(fade.from_gain),
            db_to_linear(fade.to_gain),
        ))
    }

    /// Fade in from silence over the first `duration_ms`
    pub fn fade_in(&self, duration_ms: u64) -> AudioBuffer {
        let end = self.boundary_frame(duration_ms.min(i64::MAX as u64) as i64);
        self.ramp(0, end, 0.0, 1.0)
    }

    /// Fade out to silence over the last `duration_ms`
    pub fn fade_out(&self, duration_ms: u64) -> AudioBuffer {
        let len = self.duration_ms();
        let start = self.boundary_frame(len.saturating_sub(duration_ms) as i64);
        self.ramp(start, self.frame_count(), 1.0, 0.0)
    }
}

/// Parameters of a gain ramp
///
/// Positions are milliseconds; negative values count back from the end.
/// At most two of `start`, `end` and `duration` may be set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    /// Gain in dB held before the ramp
    pub from_gain: f64,
    /// Gain in dB held after the ramp
    pub to_gain: f64,
    /// Ramp start (default: 0)
    pub start: Option<i64>,
    /// Ramp end (default: clip length)
    pub end: Option<i64>,
    /// Ramp length
    pub duration: Option<i64>,
}

impl Default for Fade {
    fn default() -> Self {
        Self {
            from_gain: 0.0,
            to_gain: 0.0,
            start: None,
            end: None,
            duration: None,
        }
    }
}

impl Fade {
    /// Ramp from `from_gain` to `to_gain` across the whole clip
    pub fn new(from_gain: f64, to_gain: f64) -> Self {
        Self {
            from_gain,
            to_gain,
            ..Self::default()
        }
    }

    /// Where the ramp begins; negative counts from the end
    pub fn start(mut self, ms: i64) -> Self {
        self.start = Some(ms);
        self
    }

    /// Where the ramp ends; negative counts from the end
    pub fn end(mut self, ms: i64) -> Self {
        self.end = Some(ms);
        self
    }

    /// Ramp length in ms
    pub fn duration(mut self, ms: i64) -> Self {
        self.duration = Some(ms);
        self
    }
}

/// Lazy, restartable sequence of consecutive chunks
///
/// Cloning the iterator restarts from the clone's position without copying
/// audio.
#[derive(Debug, Clone)]
pub struct Chunks {
    buffer: AudioBuffer,
    step_ms: u64,
    index: usize,
    count: usize,
}

impl Iterator for Chunks {
    type Item = AudioBuffer;

    fn next(&mut self) -> Option<AudioBuffer> {
        if self.index >= self.count {
            return None;
        }
        let start = self.index as u64 * self.step_ms;
        let end = start.saturating_add(self.step_ms);
        self.index += 1;
        Some(self.buffer.slice(start as i64..end.min(i64::MAX as u64) as i64))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}

/// Concatenate any number of buffers in order
///
/// An empty input yields [`AudioBuffer::empty`].
///
/// # Errors
/// * `FormatMismatch` - if normalization failed to align two formats
pub fn concat_all<'a, I>(buffers: I) -> Result<AudioBuffer>
where
    I: IntoIterator<Item = &'a AudioBuffer>,
{
    buffers
        .into_iter()
        .try_fold(AudioBuffer::empty(), |acc, buffer| acc.concatenate(buffer))
}

// ============================================================================
// Tests
// ============================================================================
