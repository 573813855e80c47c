//! Silence Detector
//!
//! Scans a buffer with a window of `min_silence_len_ms`, advancing by
//! `seek_step_ms`. Window loudness comes from a running sum of squares,
//! so each window costs O(1) regardless of its length.

use std::ops::Range;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::buffer::{db_to_linear, AudioBuffer};
use crate::error::{AudioSegError, Result};

/// Loudness at or below which a window counts as silent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "db", rename_all = "snake_case")]
pub enum SilenceThreshold {
    /// Fixed level in dBFS
    Absolute(f64),
    /// This many dB below the buffer's own average loudness
    BelowAverage(f64),
}

impl SilenceThreshold {
    /// Threshold in dBFS for a particular buffer
    ///
    /// A silent buffer has an average of `-inf`, so a relative threshold
    /// resolves to `-inf` and still matches it.
    pub fn resolve(&self, buffer: &AudioBuffer) -> f64 {
        match *self {
            SilenceThreshold::Absolute(db) => db,
            SilenceThreshold::BelowAverage(db) => buffer.dbfs() - db,
        }
    }
}

impl Default for SilenceThreshold {
    fn default() -> Self {
        SilenceThreshold::Absolute(-16.0)
    }
}

/// Silence scan parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceOptions {
    /// Shortest run reported as silence, also the window length
    pub min_silence_len_ms: u64,
    pub threshold: SilenceThreshold,
    /// Distance between window starts
    pub seek_step_ms: u64,
}

impl Default for SilenceOptions {
    fn default() -> Self {
        Self {
            min_silence_len_ms: 1000,
            threshold: SilenceThreshold::default(),
            seek_step_ms: 1,
        }
    }
}

impl SilenceOptions {
    /// Check scan parameters
    ///
    /// # Errors
    /// * `InvalidArgument` - if the window or step is zero, or the threshold is `NaN`
    pub fn validate(&self) -> Result<()> {
        if self.min_silence_len_ms == 0 {
            return Err(AudioSegError::invalid("minimum silence length must be at least 1 ms"));
        }
        if self.seek_step_ms == 0 {
            return Err(AudioSegError::invalid("seek step must be at least 1 ms"));
        }
        let db = match self.threshold {
            SilenceThreshold::Absolute(db) | SilenceThreshold::BelowAverage(db) => db,
        };
        if db.is_nan() {
            return Err(AudioSegError::invalid("silence threshold must be a number"));
        }
        Ok(())
    }
}

/// How much silence to keep around each chunk in [`AudioBuffer::split_on_silence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepSilence {
    /// Cut exactly at the detected boundaries
    Off,
    /// Keep all silence, split evenly between neighbouring chunks
    All,
    /// Pad each side with up to this many milliseconds
    Ms(u64),
}

impl Default for KeepSilence {
    fn default() -> Self {
        KeepSilence::Ms(100)
    }
}

impl AudioBuffer {
    /// Silent spans `[start_ms, end_ms)`, merged where windows overlap
    ///
    /// A buffer shorter than the window has no silent spans.
    ///
    /// # Errors
    /// * `InvalidArgument` - for invalid scan options
    pub fn detect_silence(&self, options: &SilenceOptions) -> Result<Vec<Range<u64>>> {
        options.validate()?;
        let min_len = options.min_silence_len_ms;
        let step = options.seek_step_ms;
        let len = self.duration_ms();
        if len < min_len || self.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = db_to_linear(options.threshold.resolve(self));
        let cumulative = self.cumulative_mean_squares();
        let frames_per_ms = self.frame_rate() as f64 / 1000.0;
        let total_frames = self.frame_count();

        let last_start = len - min_len;
        let starts = (0..=last_start)
            .step_by(step as usize)
            .chain((last_start % step != 0).then_some(last_start));

        let mut ranges = Vec::new();
        // (start of the current range, start of the last silent window)
        let mut current: Option<(u64, u64)> = None;
        let mut windows = 0usize;

        for start_ms in starts {
            windows += 1;
            let start = ((start_ms as f64 * frames_per_ms) as usize).min(total_frames);
            let end = (((start_ms + min_len) as f64 * frames_per_ms) as usize).min(total_frames);
            let frames = end.saturating_sub(start);
            let rms = if frames == 0 {
                0.0
            } else {
                ((cumulative[end] - cumulative[start]) / frames as f64).max(0.0).sqrt()
            };
            if rms > threshold {
                continue;
            }

            current = match current {
                None => Some((start_ms, start_ms)),
                Some((range_start, prev)) => {
                    let continuous = start_ms == prev + step;
                    // Overlapping silent windows belong to one run even
                    // when a blip between them broke the sequence
                    let has_gap = start_ms > prev + min_len;
                    if !continuous && has_gap {
                        ranges.push(range_start..prev + min_len);
                        Some((start_ms, start_ms))
                    } else {
                        Some((range_start, start_ms))
                    }
                }
            };
        }
        if let Some((range_start, prev)) = current {
            ranges.push(range_start..prev + min_len);
        }

        debug!(
            "silence scan: {} windows of {} ms, {} silent range(s)",
            windows,
            min_len,
            ranges.len()
        );
        Ok(ranges)
    }

    /// Non-silent spans, the complement of [`AudioBuffer::detect_silence`]
    ///
    /// # Errors
    /// * `InvalidArgument` - for invalid scan options
    pub fn detect_nonsilent(&self, options: &SilenceOptions) -> Result<Vec<Range<u64>>> {
        let silent = self.detect_silence(options)?;
        let len = self.duration_ms();

        if silent.is_empty() {
            return Ok(vec![0..len]);
        }
        if silent[0].start == 0 && silent[0].end == len {
            return Ok(Vec::new());
        }

        let mut ranges = Vec::with_capacity(silent.len() + 1);
        let mut prev_end = 0;
        for span in &silent {
            ranges.push(prev_end..span.start);
            prev_end = span.end;
        }
        if prev_end != len {
            ranges.push(prev_end..len);
        }
        if ranges.first() == Some(&(0..0)) {
            ranges.remove(0);
        }
        Ok(ranges)
    }

    /// Cut the buffer into its non-silent chunks
    ///
    /// Each chunk is padded with up to `keep` of the surrounding silence.
    /// When two padded chunks would overlap, the silence between them is
    /// split at its midpoint.
    ///
    /// # Errors
    /// * `InvalidArgument` - for invalid scan options
    pub fn split_on_silence(&self, options: &SilenceOptions, keep: KeepSilence) -> Result<Vec<AudioBuffer>> {
        let len = self.duration_ms() as i64;
        let pad = match keep {
            KeepSilence::Off => 0,
            KeepSilence::All => len,
            KeepSilence::Ms(ms) => i64::try_from(ms).unwrap_or(i64::MAX).min(len),
        };

        let mut ranges: Vec<(i64, i64)> = self
            .detect_nonsilent(options)?
            .into_iter()
            .map(|r| ((r.start as i64).saturating_sub(pad), (r.end as i64).saturating_add(pad)))
            .collect();

        for i in 1..ranges.len() {
            let last_end = ranges[i - 1].1;
            let next_start = ranges[i].0;
            if next_start < last_end {
                let mid = (last_end + next_start).div_euclid(2);
                ranges[i - 1].1 = mid;
                ranges[i].0 = mid;
            }
        }

        Ok(ranges
            .into_iter()
            .map(|(start, end)| self.slice(start.max(0)..end.min(len)))
            .collect())
    }

    /// Length of the silent prefix in ms
    ///
    /// Advances `chunk_ms` at a time while the chunk's loudness is below
    /// `threshold_db`. Returns the clip length if it never gets louder.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `chunk_ms` is zero
    pub fn detect_leading_silence(&self, threshold_db: f64, chunk_ms: u64) -> Result<u64> {
        if chunk_ms == 0 {
            return Err(AudioSegError::invalid("chunk size must be at least 1 ms"));
        }
        let len = self.duration_ms();
        let mut trim = 0u64;
        while trim < len {
            let end = trim.saturating_add(chunk_ms).min(len);
            let chunk = self.slice(trim as i64..end as i64);
            if chunk.dbfs() >= threshold_db {
                break;
            }
            trim = end;
        }
        Ok(trim.min(len))
    }

    /// Running sum of per-frame mean squares, normalized to full scale
    ///
    /// Entry `i` holds the sum over frames `[0, i)`.
    fn cumulative_mean_squares(&self) -> Vec<f64> {
        let channels = self.channels() as usize;
        let norm = self.max_possible_amplitude().powi(2);
        let mut out = Vec::with_capacity(self.frame_count() + 1);
        let mut acc = 0.0;
        out.push(acc);
        for frame in self.samples().chunks_exact(channels) {
            let sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
            acc += sq / channels as f64 / norm;
            out.push(acc);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::format::{AudioFormat, SampleWidth};
    use pretty_assertions::assert_eq;

    fn format() -> AudioFormat {
        AudioFormat::new(8000, 1, SampleWidth::Int16).unwrap()
    }

    fn tone(duration_ms: u64) -> AudioBuffer {
        let frames = (duration_ms * 8) as usize;
        let samples: Vec<i32> = (0..frames)
            .map(|i| (16000.0 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 8000.0).sin()) as i32)
            .collect();
        AudioBuffer::from_samples(&samples, format()).unwrap()
    }

    /// 1000 ms tone, 1500 ms silence, 1000 ms tone
    fn speech_like() -> AudioBuffer {
        tone(1000)
            .concatenate(&AudioBuffer::silent(1500, format()))
            .unwrap()
            .concatenate(&tone(1000))
            .unwrap()
    }

    fn quiet() -> SilenceOptions {
        SilenceOptions {
            threshold: SilenceThreshold::Absolute(-60.0),
            ..SilenceOptions::default()
        }
    }

    #[test]
    fn test_whole_silent_buffer_is_one_span() {
        let seg = AudioBuffer::silent(1000, format());
        let options = SilenceOptions {
            threshold: SilenceThreshold::BelowAverage(0.0),
            ..SilenceOptions::default()
        };
        assert_eq!(seg.detect_silence(&options).unwrap(), vec![0..1000]);
        assert!(seg.detect_nonsilent(&options).unwrap().is_empty());
    }

    #[test]
    fn test_detect_silence_gap() {
        let seg = speech_like();
        assert_eq!(seg.detect_silence(&quiet()).unwrap(), vec![1000..2500]);
        assert_eq!(seg.detect_nonsilent(&quiet()).unwrap(), vec![0..1000, 2500..3500]);
    }

    #[test]
    fn test_seek_step_reaches_last_window() {
        let seg = tone(1000).concatenate(&AudioBuffer::silent(1505, format())).unwrap();
        let options = SilenceOptions {
            seek_step_ms: 10,
            ..quiet()
        };
        let spans = seg.detect_silence(&options).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].end, seg.duration_ms());
    }

    #[test]
    fn test_no_silence() {
        let seg = tone(2000);
        assert!(seg.detect_silence(&quiet()).unwrap().is_empty());
        assert_eq!(seg.detect_nonsilent(&quiet()).unwrap(), vec![0..2000]);
    }

    #[test]
    fn test_shorter_than_window() {
        let seg = AudioBuffer::silent(999, format());
        assert!(seg.detect_silence(&quiet()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_options() {
        let seg = tone(100);
        let zero_step = SilenceOptions {
            seek_step_ms: 0,
            ..SilenceOptions::default()
        };
        assert!(seg.detect_silence(&zero_step).is_err());
        let zero_len = SilenceOptions {
            min_silence_len_ms: 0,
            ..SilenceOptions::default()
        };
        assert!(seg.detect_silence(&zero_len).is_err());
    }

    #[test]
    fn test_split_on_silence_padding() {
        let seg = speech_like();
        let lengths = |keep| -> Vec<u64> {
            seg.split_on_silence(&quiet(), keep)
                .unwrap()
                .iter()
                .map(AudioBuffer::duration_ms)
                .collect()
        };
        assert_eq!(lengths(KeepSilence::Off), vec![1000, 1000]);
        assert_eq!(lengths(KeepSilence::Ms(100)), vec![1100, 1100]);
        assert_eq!(lengths(KeepSilence::Ms(1000)), vec![1750, 1750]);
        assert_eq!(lengths(KeepSilence::All), vec![1750, 1750]);
    }

    #[test]
    fn test_split_single_chunk() {
        let seg = tone(500).concatenate(&AudioBuffer::silent(1200, format())).unwrap();
        let chunks = seg.split_on_silence(&quiet(), KeepSilence::All).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], seg);
    }

    #[test]
    fn test_split_all_silent() {
        let silent = AudioBuffer::silent(3000, format());
        assert!(silent.split_on_silence(&quiet(), KeepSilence::All).unwrap().is_empty());
        assert!(silent.split_on_silence(&quiet(), KeepSilence::Off).unwrap().is_empty());
    }

    #[test]
    fn test_split_huge_padding_keeps_everything() {
        let all = speech_like().split_on_silence(&quiet(), KeepSilence::All).unwrap();
        for ms in [u64::MAX, i64::MAX as u64, 1 << 40] {
            let chunks = speech_like().split_on_silence(&quiet(), KeepSilence::Ms(ms)).unwrap();
            assert_eq!(chunks, all);
        }
    }

    #[test]
    fn test_leading_silence_huge_chunk() {
        assert_eq!(tone(1000).detect_leading_silence(-50.0, 1 << 63).unwrap(), 0);
        assert_eq!(tone(1000).detect_leading_silence(-50.0, u64::MAX).unwrap(), 0);
        let silent = AudioBuffer::silent(400, format());
        assert_eq!(silent.detect_leading_silence(-50.0, u64::MAX).unwrap(), 400);
    }

    #[test]
    fn test_leading_silence() {
        let seg = AudioBuffer::silent(700, format()).concatenate(&tone(500)).unwrap();
        assert_eq!(seg.detect_leading_silence(-50.0, 10).unwrap(), 700);
        assert_eq!(tone(500).detect_leading_silence(-50.0, 10).unwrap(), 0);

        let silent = AudioBuffer::silent(333, format());
        assert_eq!(silent.detect_leading_silence(-50.0, 10).unwrap(), 333);
        assert!(silent.detect_leading_silence(-50.0, 0).is_err());
    }

    #[test]
    fn test_options_serde() {
        let options = SilenceOptions {
            threshold: SilenceThreshold::BelowAverage(16.0),
            ..SilenceOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: SilenceOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);

        let partial: SilenceOptions = serde_json::from_str(r#"{"seek_step_ms": 10}"#).unwrap();
        assert_eq!(partial.min_silence_len_ms, 1000);
        assert_eq!(partial.seek_step_ms, 10);
    }
}
