//! Tone and noise generators
//!
//! Waveforms produce floats in `[-1, 1]`; [`SignalGenerator::to_audio_buffer`]
//! scales them to a mono PCM buffer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::buffer::{db_to_linear, AudioBuffer};
use crate::engine::format::{AudioFormat, SampleWidth};
use crate::engine::segment::check_gain;
use crate::error::{AudioSegError, Result};

/// Shape of a generated signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine { freq: f64 },
    /// +1 for the first `duty_cycle` of each period, -1 for the rest
    Pulse { freq: f64, duty_cycle: f64 },
    Square { freq: f64 },
    /// Rises for `duty_cycle` of each period, then falls
    Sawtooth { freq: f64, duty_cycle: f64 },
    Triangle { freq: f64 },
    /// Uniform noise; a seed makes the output reproducible
    WhiteNoise { seed: Option<u64> },
}

impl Waveform {
    fn validate(&self) -> Result<()> {
        let (freq, duty) = match *self {
            Waveform::Sine { freq } | Waveform::Square { freq } | Waveform::Triangle { freq } => {
                (freq, 0.5)
            }
            Waveform::Pulse { freq, duty_cycle } | Waveform::Sawtooth { freq, duty_cycle } => {
                (freq, duty_cycle)
            }
            Waveform::WhiteNoise { .. } => return Ok(()),
        };
        if !(freq.is_finite() && freq > 0.0) {
            return Err(AudioSegError::invalid(format!("frequency must be positive, got {}", freq)));
        }
        if !(0.0..=1.0).contains(&duty) {
            return Err(AudioSegError::invalid(format!(
                "duty cycle must be within [0, 1], got {}",
                duty
            )));
        }
        Ok(())
    }
}

/// Renders a [`Waveform`] at a fixed rate and width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalGenerator {
    pub waveform: Waveform,
    pub sample_rate: u32,
    pub sample_width: SampleWidth,
}

impl SignalGenerator {
    /// 44.1kHz, 16-bit
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            sample_rate: 44100,
            sample_width: SampleWidth::Int16,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_sample_width(mut self, sample_width: SampleWidth) -> Self {
        self.sample_width = sample_width;
        self
    }

    /// First `count` values of the waveform
    ///
    /// # Errors
    /// * `InvalidArgument` - for a non-positive frequency or a duty cycle outside `[0, 1]`
    pub fn render(&self, count: usize) -> Result<Vec<f64>> {
        self.waveform.validate()?;
        let rate = self.sample_rate as f64;

        let values = match self.waveform {
            Waveform::Sine { freq } => {
                let step = freq * 2.0 * std::f64::consts::PI / rate;
                (0..count).map(|n| (step * n as f64).sin()).collect()
            }
            Waveform::Pulse { freq, duty_cycle } => pulse(rate / freq, duty_cycle, count),
            Waveform::Square { freq } => pulse(rate / freq, 0.5, count),
            Waveform::Sawtooth { freq, duty_cycle } => sawtooth(rate / freq, duty_cycle, count),
            Waveform::Triangle { freq } => sawtooth(rate / freq, 0.5, count),
            Waveform::WhiteNoise { seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                (0..count).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect()
            }
        };
        Ok(values)
    }

    /// Render `duration_ms` of mono audio at `volume_db` relative to full scale
    ///
    /// # Errors
    /// * `InvalidArgument` - for an invalid waveform, a zero rate or an unusable volume
    ///
    /// # Example
    /// ```
    /// use audioseg::engine::{SignalGenerator, Waveform};
    ///
    /// let beep = SignalGenerator::new(Waveform::Sine { freq: 440.0 })
    ///     .to_audio_buffer(250, -6.0)
    ///     .unwrap();
    /// assert_eq!(beep.duration_ms(), 250);
    /// ```
    pub fn to_audio_buffer(&self, duration_ms: u64, volume_db: f64) -> Result<AudioBuffer> {
        check_gain("volume", volume_db)?;
        let format = AudioFormat::new(self.sample_rate, 1, self.sample_width)?;

        let count = (self.sample_rate as f64 * duration_ms as f64 / 1000.0) as usize;
        let scale = self.sample_width.max_value() as f64 * db_to_linear(volume_db);
        let samples: Vec<i32> = self
            .render(count)?
            .into_iter()
            .map(|v| self.sample_width.saturate((v * scale) as i64))
            .collect();
        AudioBuffer::from_samples(&samples, format)
    }
}

fn pulse(cycle_length: f64, duty_cycle: f64, count: usize) -> Vec<f64> {
    let pulse_length = cycle_length * duty_cycle;
    (0..count)
        .map(|n| {
            if (n as f64 % cycle_length) < pulse_length {
                1.0
            } else {
                -1.0
            }
        })
        .collect()
}

fn sawtooth(cycle_length: f64, duty_cycle: f64, count: usize) -> Vec<f64> {
    let midpoint = cycle_length * duty_cycle;
    let ascend_length = midpoint;
    let descend_length = cycle_length - ascend_length;
    (0..count)
        .map(|n| {
            let pos = n as f64 % cycle_length;
            if pos < ascend_length {
                2.0 * pos / ascend_length - 1.0
            } else {
                1.0 - 2.0 * (pos - midpoint) / descend_length
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sine_samples() {
        let seg = SignalGenerator::new(Waveform::Sine { freq: 450.0 })
            .to_audio_buffer(1000, 0.0)
            .unwrap();
        assert_eq!(seg.frame_count(), 44100);
        assert_eq!(seg.channels(), 1);
        assert_eq!(
            &seg.samples()[..8],
            &[0, 2099, 4190, 6263, 8311, 10325, 12296, 14217]
        );
    }

    #[test]
    fn test_volume_scales_peak() {
        let gen = SignalGenerator::new(Waveform::Square { freq: 100.0 });
        let full = gen.to_audio_buffer(100, 0.0).unwrap();
        let quiet = gen.to_audio_buffer(100, -6.0).unwrap();
        assert_eq!(full.max(), 32767);
        assert_abs_diff_eq!(quiet.max_dbfs(), -6.0, epsilon = 0.01);
    }

    #[test]
    fn test_pulse_duty_cycle() {
        let gen = SignalGenerator::new(Waveform::Pulse { freq: 1.0, duty_cycle: 0.25 }).with_sample_rate(8);
        let values = gen.render(8).unwrap();
        assert_eq!(values, vec![1.0, 1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_triangle_shape() {
        let gen = SignalGenerator::new(Waveform::Triangle { freq: 1.0 }).with_sample_rate(8);
        let values = gen.render(8).unwrap();
        assert_eq!(values, vec![-1.0, -0.5, 0.0, 0.5, 1.0, 0.5, 0.0, -0.5]);
    }

    #[test]
    fn test_sawtooth_rises() {
        let gen = SignalGenerator::new(Waveform::Sawtooth { freq: 1.0, duty_cycle: 1.0 }).with_sample_rate(4);
        assert_eq!(gen.render(4).unwrap(), vec![-1.0, -0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let gen = SignalGenerator::new(Waveform::WhiteNoise { seed: Some(7) });
        let a = gen.to_audio_buffer(50, -3.0).unwrap();
        let b = gen.to_audio_buffer(50, -3.0).unwrap();
        assert_eq!(a, b);
        assert!(gen.render(1000).unwrap().iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_generator_validation() {
        assert!(SignalGenerator::new(Waveform::Sine { freq: 0.0 })
            .render(10)
            .is_err());
        assert!(SignalGenerator::new(Waveform::Pulse { freq: 10.0, duty_cycle: 1.5 })
            .render(10)
            .is_err());
        assert!(SignalGenerator::new(Waveform::Sine { freq: 10.0 })
            .to_audio_buffer(10, f64::NAN)
            .is_err());
    }

    #[test]
    fn test_eight_bit_output() {
        let seg = SignalGenerator::new(Waveform::Square { freq: 10.0 })
            .with_sample_width(SampleWidth::Int8)
            .with_sample_rate(1000)
            .to_audio_buffer(100, 0.0)
            .unwrap();
        assert_eq!(seg.samples()[0], 127);
        assert_eq!(seg.raw_data()[0], 0xFF);
    }
}
