//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use log::{debug, info};
use serde::Serialize;

use super::{Commands, SilenceArgs};
use crate::codec::{AudioCodec, ExportOptions};
use crate::config::Config;
use crate::engine::{AudioBuffer, KeepSilence, Overlay, SampleWidth, SilenceOptions, SilenceThreshold};

/// Configuration plus the codec it selects, shared by every command
pub struct Session {
    pub config: Config,
    pub codec: AudioCodec,
}

impl Session {
    /// Load the configuration file if one is given, else use defaults
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => Config::default(),
        };
        let codec = AudioCodec::from_config(&config);
        debug!("Using converter {}", codec.converter().program().display());
        Ok(Self { config, codec })
    }

    fn read(&self, path: &Path) -> Result<AudioBuffer> {
        self.codec
            .from_file(path, None, None)
            .with_context(|| format!("failed to read {}", path.display()))
    }

    fn write(&self, buffer: &AudioBuffer, path: &Path) -> Result<()> {
        self.write_with(buffer, path, None, &ExportOptions::default())
    }

    fn write_with(&self, buffer: &AudioBuffer, path: &Path, format: Option<&str>, options: &ExportOptions) -> Result<()> {
        self.codec
            .export(buffer, path, format, options)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {} ({:.3}s)", path.display(), buffer.duration_seconds());
        Ok(())
    }

    fn silence_options(&self, args: &SilenceArgs) -> SilenceOptions {
        let base = self.config.silence;
        let threshold = match (args.threshold, args.relative) {
            (Some(db), false) => SilenceThreshold::Absolute(db),
            (Some(db), true) => SilenceThreshold::BelowAverage(db),
            (None, _) => base.threshold,
        };
        SilenceOptions {
            min_silence_len_ms: args.min_len.unwrap_or(base.min_silence_len_ms),
            threshold,
            seek_step_ms: args.seek_step.unwrap_or(base.seek_step_ms),
        }
    }
}

/// Summary printed by `info`
#[derive(Debug, Serialize)]
pub struct ClipInfo {
    pub duration_ms: u64,
    pub frame_count: usize,
    pub frame_rate: u32,
    pub channels: u16,
    pub sample_width: usize,
    /// `None` stands for digital silence
    pub dbfs: Option<f64>,
    pub max_dbfs: Option<f64>,
}

impl ClipInfo {
    pub fn of(buffer: &AudioBuffer) -> Self {
        let finite = |db: f64| db.is_finite().then_some(db);
        Self {
            duration_ms: buffer.duration_ms(),
            frame_count: buffer.frame_count(),
            frame_rate: buffer.frame_rate(),
            channels: buffer.channels(),
            sample_width: buffer.sample_width().bytes(),
            dbfs: finite(buffer.dbfs()),
            max_dbfs: finite(buffer.max_dbfs()),
        }
    }
}

/// Dispatch a parsed command
pub fn run(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Info { input, json } => info_cmd(session, &input, json),
        Commands::Concat {
            inputs,
            output,
            crossfade,
        } => {
            let crossfade = crossfade.unwrap_or(session.config.crossfade_ms);
            info!("Joining {} clips with a {} ms crossfade", inputs.len(), crossfade);
            let mut clips = inputs.iter().map(|path| session.read(path));
            let first = match clips.next() {
                Some(clip) => clip?,
                None => bail!("no input clips"),
            };
            let joined = clips.try_fold(first, |out, clip| -> Result<AudioBuffer> {
                Ok(out.append(&clip?, crossfade)?)
            })?;
            session.write(&joined, &output)
        }
        Commands::Overlay {
            base,
            layer,
            output,
            position,
            gain_during_overlay,
            looped,
            times,
        } => {
            let mut overlay = Overlay::at(position);
            if looped {
                overlay = overlay.looped();
            }
            if let Some(n) = times {
                overlay = overlay.times(n);
            }
            if let Some(db) = gain_during_overlay {
                overlay = overlay.gain_during_overlay(db);
            }
            let mixed = session.read(&base)?.overlay(&session.read(&layer)?, overlay)?;
            session.write(&mixed, &output)
        }
        Commands::Gain { input, output, db, pan } => {
            let mut clip = session.read(&input)?.apply_gain(db)?;
            if let Some(pan) = pan {
                clip = clip.pan(pan)?;
            }
            session.write(&clip, &output)
        }
        Commands::Fade {
            input,
            output,
            fade_in,
            fade_out,
        } => {
            let faded = session.read(&input)?.fade_in(fade_in).fade_out(fade_out);
            session.write(&faded, &output)
        }
        Commands::Convert {
            input,
            output,
            format,
            codec,
            bitrate,
            rate,
            channels,
            width,
        } => {
            let mut clip = session.read(&input)?;
            if let Some(rate) = rate {
                clip = clip.set_frame_rate(rate)?;
            }
            if let Some(channels) = channels {
                clip = clip.set_channels(channels)?;
            }
            if let Some(width) = width {
                clip = clip.set_sample_width(SampleWidth::from_bytes(width)?);
            }
            let options = ExportOptions {
                codec,
                bitrate,
                parameters: Vec::new(),
            };
            session.write_with(&clip, &output, format.as_deref(), &options)
        }
        Commands::Silence { input, scan, json } => {
            let clip = session.read(&input)?;
            let spans = clip.detect_silence(&session.silence_options(&scan))?;
            if json {
                let pairs: Vec<[u64; 2]> = spans.iter().map(|s| [s.start, s.end]).collect();
                println!("{}", serde_json::to_string_pretty(&pairs)?);
            } else if spans.is_empty() {
                println!("No silence found.");
            } else {
                for span in &spans {
                    println!("{:>8} - {:>8} ms ({} ms)", span.start, span.end, span.end - span.start);
                }
            }
            Ok(())
        }
        Commands::Split {
            input,
            out_dir,
            scan,
            keep,
        } => {
            let clip = session.read(&input)?;
            let keep: KeepSilence = keep.unwrap_or(session.config.keep_silence);
            let chunks = clip.split_on_silence(&session.silence_options(&scan), keep)?;
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            for (i, chunk) in chunks.iter().enumerate() {
                session.write(chunk, &out_dir.join(format!("chunk-{:03}.wav", i)))?;
            }
            println!("{} chunks", chunks.len());
            Ok(())
        }
        Commands::Trim {
            input,
            output,
            threshold,
            chunk,
        } => {
            let clip = session.read(&input)?;
            let trimmed = clip.trim_silence(
                threshold.unwrap_or(session.config.leading_silence_threshold_db),
                chunk.unwrap_or(session.config.leading_silence_chunk_ms),
            )?;
            session.write(&trimmed, &output)
        }
        Commands::Normalize {
            input,
            output,
            headroom,
        } => {
            let normalized = session.read(&input)?.normalize(headroom)?;
            session.write(&normalized, &output)
        }
    }
}

fn info_cmd(session: &Session, input: &Path, json: bool) -> Result<()> {
    let info = ClipInfo::of(&session.read(input)?);
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let level = |db: Option<f64>| db.map_or_else(|| "silent".to_string(), |db| format!("{:.2} dBFS", db));
    println!("File:        {}", input.display());
    println!("{:-<40}", "");
    println!("Duration:    {} ms ({} frames)", info.duration_ms, info.frame_count);
    println!("Frame rate:  {} Hz", info.frame_rate);
    println!("Channels:    {}", info.channels);
    println!("Sample size: {} bit", info.sample_width * 8);
    println!("Loudness:    {}", level(info.dbfs));
    println!("Peak:        {}", level(info.max_dbfs));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioFormat, SignalGenerator, Waveform};
    use tempfile::tempdir;

    #[test]
    fn test_clip_info() {
        let tone = SignalGenerator::new(Waveform::Sine { freq: 440.0 })
            .to_audio_buffer(250, -6.0)
            .unwrap();
        let info = ClipInfo::of(&tone);
        assert_eq!(info.duration_ms, 250);
        assert_eq!(info.frame_rate, 44100);
        assert_eq!(info.sample_width, 2);
        assert!(info.max_dbfs.unwrap() < -5.9);

        let silent = ClipInfo::of(&AudioBuffer::silent(10, AudioFormat::cd_quality()));
        assert!(silent.dbfs.is_none());
    }

    #[test]
    fn test_silence_overrides() {
        let session = Session::open(None).unwrap();
        let args = SilenceArgs {
            threshold: Some(14.0),
            relative: true,
            ..SilenceArgs::default()
        };
        let options = session.silence_options(&args);
        assert_eq!(options.threshold, SilenceThreshold::BelowAverage(14.0));
        assert_eq!(options.min_silence_len_ms, 1000);
    }

    #[test]
    fn test_gain_command_writes_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        let session = Session::open(None).unwrap();

        let tone = SignalGenerator::new(Waveform::Square { freq: 100.0 })
            .to_audio_buffer(100, -12.0)
            .unwrap();
        session.write(&tone, &input).unwrap();

        let command = Commands::Gain {
            input,
            output: output.clone(),
            db: 6.0,
            pan: None,
        };
        run(&session, command).unwrap();
        let louder = session.read(&output).unwrap();
        assert!((louder.max_dbfs() - tone.max_dbfs() - 6.0).abs() < 0.01);
    }
}
