//! One-pole RC filters
//!
//! Each channel is filtered independently. The first frame passes through
//! unchanged and seeds the filter state.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;
use crate::error::{AudioSegError, Result};

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Remove above the cutoff
    LowPass,
    /// Remove below the cutoff
    HighPass,
}

/// Smoothing coefficient for an RC circuit with the given cutoff
fn coefficient(filter_type: FilterType, cutoff_hz: f64, sample_rate: u32) -> f64 {
    let rc = 1.0 / (cutoff_hz * 2.0 * PI);
    let dt = 1.0 / sample_rate as f64;
    match filter_type {
        FilterType::LowPass => dt / (rc + dt),
        FilterType::HighPass => rc / (rc + dt),
    }
}

impl AudioBuffer {
    /// Apply a one-pole filter
    ///
    /// # Errors
    /// * `InvalidArgument` - if `cutoff_hz` is not positive
    pub fn filter(&self, filter_type: FilterType, cutoff_hz: f64) -> Result<AudioBuffer> {
        if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
            return Err(AudioSegError::invalid(format!(
                "cutoff must be a positive frequency, got {}",
                cutoff_hz
            )));
        }

        let channels = self.channels() as usize;
        let width = self.sample_width();
        let alpha = coefficient(filter_type, cutoff_hz, self.frame_rate());
        let original = self.samples();
        let mut filtered = original.clone();

        let mut last: Vec<f64> = original.iter().take(channels).map(|&s| s as f64).collect();
        for i in 1..self.frame_count() {
            for ch in 0..channels {
                let offset = i * channels + ch;
                let x = original[offset] as f64;
                last[ch] = match filter_type {
                    FilterType::LowPass => last[ch] + alpha * (x - last[ch]),
                    FilterType::HighPass => {
                        alpha * (last[ch] + x - original[offset - channels] as f64)
                    }
                };
                filtered[offset] = width.saturate(last[ch].trunc() as i64);
            }
        }

        Ok(self.spawn_samples(&filtered))
    }

    /// Attenuate content above `cutoff_hz`
    pub fn low_pass_filter(&self, cutoff_hz: f64) -> Result<AudioBuffer> {
        self.filter(FilterType::LowPass, cutoff_hz)
    }

    /// Attenuate content below `cutoff_hz`
    pub fn high_pass_filter(&self, cutoff_hz: f64) -> Result<AudioBuffer> {
        self.filter(FilterType::HighPass, cutoff_hz)
    }
}
