//! Dynamic range compression
//!
//! A feed-forward compressor driven by the RMS level of the `attack_ms`
//! of audio preceding each frame. Gain reduction follows a hard-knee
//! curve and moves towards its target linearly: it reaches full
//! attenuation over `attack_ms` and recovers over `release_ms`.

use serde::{Deserialize, Serialize};

use crate::engine::{db_to_linear, linear_to_db, AudioBuffer};
use crate::error::{AudioSegError, Result};

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorParams {
    /// Level in dBFS above which compression starts
    pub threshold_db: f64,
    /// Compression ratio (4.0 means 4:1)
    pub ratio: f64,
    /// Look-behind window and time to reach full attenuation, in ms
    pub attack_ms: f64,
    /// Time to recover from full attenuation, in ms
    pub release_ms: f64,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 50.0,
        }
    }
}

impl CompressorParams {
    /// Validate parameters
    ///
    /// # Errors
    /// * `InvalidArgument` - for a non-finite threshold, a ratio below 1 or
    ///   non-positive times
    pub fn validate(&self) -> Result<()> {
        if !self.threshold_db.is_finite() {
            return Err(AudioSegError::invalid(format!(
                "threshold_db must be finite, got {}",
                self.threshold_db
            )));
        }
        if self.ratio.is_nan() || self.ratio < 1.0 {
            return Err(AudioSegError::invalid(format!(
                "ratio must be at least 1.0, got {}",
                self.ratio
            )));
        }
        if self.attack_ms.is_nan() || self.attack_ms <= 0.0 {
            return Err(AudioSegError::invalid(format!(
                "attack_ms must be positive, got {}",
                self.attack_ms
            )));
        }
        if self.release_ms.is_nan() || self.release_ms <= 0.0 {
            return Err(AudioSegError::invalid(format!(
                "release_ms must be positive, got {}",
                self.release_ms
            )));
        }
        Ok(())
    }

    /// Gain reduction in dB (zero or negative) for an input level in dBFS
    fn compute_gain_reduction_db(&self, input_db: f64) -> f64 {
        if input_db <= self.threshold_db {
            0.0
        } else {
            // output = threshold + (input - threshold) / ratio
            (self.threshold_db + (input_db - self.threshold_db) / self.ratio) - input_db
        }
    }
}

impl AudioBuffer {
    /// Reduce the level of passages louder than the threshold
    ///
    /// All channels share one detector, so the stereo image is kept.
    ///
    /// # Errors
    /// * `InvalidArgument` - for invalid parameters
    pub fn compress_dynamic_range(&self, params: &CompressorParams) -> Result<AudioBuffer> {
        params.validate()?;

        let channels = self.channels() as usize;
        let width = self.sample_width();
        let max_amplitude = self.max_possible_amplitude();
        let threshold_rms = max_amplitude * db_to_linear(params.threshold_db);

        let attack_frames = self.frame_count_for_ms(params.attack_ms);
        let release_frames = self.frame_count_for_ms(params.release_ms);
        let look_frames = attack_frames as usize;

        let samples = self.samples();
        let frame_energy: Vec<i128> = samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().map(|&s| (s as i128) * (s as i128)).sum())
            .collect();

        let mut output = Vec::with_capacity(samples.len());
        let mut window_energy: i128 = 0;
        let mut attenuation = 0.0_f64;

        for (i, frame) in samples.chunks_exact(channels).enumerate() {
            // RMS of frames [i - look_frames, i)
            let window_start = i.saturating_sub(look_frames);
            let window_frames = i - window_start;
            let rms = if window_frames == 0 {
                0.0
            } else {
                (window_energy as f64 / (window_frames * channels) as f64).sqrt()
            };

            let max_attenuation = if rms > 0.0 {
                -params.compute_gain_reduction_db(linear_to_db(rms / max_amplitude))
            } else {
                0.0
            };

            if rms > threshold_rms && attenuation <= max_attenuation {
                attenuation = (attenuation + max_attenuation / attack_frames).min(max_attenuation);
            } else {
                attenuation = (attenuation - max_attenuation / release_frames).max(0.0);
            }

            if attenuation == 0.0 {
                output.extend_from_slice(frame);
            } else {
                let factor = db_to_linear(-attenuation);
                output.extend(frame.iter().map(|&s| width.quantize(s as f64 * factor)));
            }

            // Slide the look-behind window forward by one frame
            window_energy += frame_energy[i];
            if i >= look_frames {
                window_energy -= frame_energy[i - look_frames];
            }
        }

        Ok(self.spawn_samples(&output))
    }
}

// ============================================================================
// Tests
// ============================================================================
