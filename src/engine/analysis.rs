//! Analysis: loudness, peak and DC offset measurement

use crate::engine::buffer::{linear_to_db, AudioBuffer};
use crate::error::{AudioSegError, Result};

impl AudioBuffer {
    /// Root-mean-square of every sample across all channels
    pub fn rms(&self) -> f64 {
        let samples = self.samples();
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / samples.len() as f64).sqrt()
    }

    /// Loudness relative to full scale; `-inf` for digital silence
    pub fn dbfs(&self) -> f64 {
        let rms = self.rms();
        if rms == 0.0 {
            return f64::NEG_INFINITY;
        }
        linear_to_db(rms / self.max_possible_amplitude())
    }

    /// Peak absolute sample value
    pub fn max(&self) -> u32 {
        self.samples()
            .into_iter()
            .map(i32::unsigned_abs)
            .max()
            .unwrap_or(0)
    }

    /// Peak level relative to full scale
    ///
    /// `apply_gain(-max_dbfs())` brings the peak to 0 dBFS.
    pub fn max_dbfs(&self) -> f64 {
        linear_to_db(self.max() as f64 / self.max_possible_amplitude())
    }

    /// Average signed value of one channel, normalized to `[-1, 1]`
    ///
    /// # Errors
    /// * `InvalidArgument` - if `channel` is out of range
    pub fn get_dc_offset(&self, channel: usize) -> Result<f64> {
        let samples = self.channel_samples(channel)?;
        if samples.is_empty() {
            return Ok(0.0);
        }
        let sum: i64 = samples.iter().map(|&s| s as i64).sum();
        Ok(sum as f64 / samples.len() as f64 / self.max_possible_amplitude())
    }

    /// Subtract a DC offset from one channel, or from every channel
    ///
    /// Each selected channel uses `offset` when given, otherwise its own
    /// measured offset. Results are clamped to the width's range.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `offset` is outside `[-1, 1]` or `channel`
    ///   is out of range
    pub fn remove_dc_offset(&self, channel: Option<usize>, offset: Option<f64>) -> Result<AudioBuffer> {
        if let Some(offset) = offset {
            if !(-1.0..=1.0).contains(&offset) {
                return Err(AudioSegError::invalid(format!(
                    "DC offset must be within [-1, 1], got {}",
                    offset
                )));
            }
        }

        let channels = self.channels() as usize;
        let selected: Vec<usize> = match channel {
            Some(ch) if ch >= channels => {
                return Err(AudioSegError::invalid(format!(
                    "channel {} out of range for {}-channel audio",
                    ch, channels
                )))
            }
            Some(ch) => vec![ch],
            None => (0..channels).collect(),
        };

        let mut biases = vec![0.0; channels];
        for &ch in &selected {
            let off = match offset {
                Some(off) => off,
                None => self.get_dc_offset(ch)?,
            };
            biases[ch] = off * self.max_possible_amplitude();
        }

        let width = self.sample_width();
        let mut samples = self.samples();
        for frame in samples.chunks_exact_mut(channels) {
            for (s, bias) in frame.iter_mut().zip(&biases) {
                *s = width.quantize(*s as f64 - bias);
            }
        }
        Ok(self.spawn_samples(&samples))
    }
}
