//! CLI Module
//!
//! Command-line front end for audioseg. Every command reads its inputs
//! through the codec boundary and writes by output extension.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::KeepSilence;

/// audioseg - slice, mix, fade and analyse audio clips
#[derive(Parser, Debug)]
#[command(name = "audioseg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show format and levels of a clip
    Info {
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Join clips end to end with a crossfade
    Concat {
        /// Clips in playback order
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Crossfade in ms (configured default when omitted)
        #[arg(long)]
        crossfade: Option<u64>,
    },

    /// Mix one clip on top of another
    Overlay {
        base: PathBuf,
        layer: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Where the layer starts, in ms
        #[arg(long, default_value_t = 0)]
        position: u64,

        /// Gain applied to the base while the layer plays, in dB
        #[arg(long, allow_hyphen_values = true)]
        gain_during_overlay: Option<f64>,

        /// Repeat the layer until the base ends
        #[arg(long = "loop")]
        looped: bool,

        /// Repeat the layer this many times
        #[arg(long)]
        times: Option<u32>,
    },

    /// Change volume, optionally panning
    Gain {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Gain in dB
        #[arg(long, allow_hyphen_values = true)]
        db: f64,

        /// Pan from -1.0 (left) to 1.0 (right)
        #[arg(long, allow_hyphen_values = true)]
        pan: Option<f64>,
    },

    /// Fade a clip in and/or out
    Fade {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Fade-in length in ms
        #[arg(long = "in", default_value_t = 0)]
        fade_in: u64,

        /// Fade-out length in ms
        #[arg(long = "out", default_value_t = 0)]
        fade_out: u64,
    },

    /// Re-encode a clip, optionally changing its PCM format
    Convert {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Output format (defaults to the output extension)
        #[arg(short, long)]
        format: Option<String>,

        /// Encoder codec name
        #[arg(long)]
        codec: Option<String>,

        /// Encoder bitrate, e.g. 128k
        #[arg(long)]
        bitrate: Option<String>,

        /// Target frame rate in Hz
        #[arg(long)]
        rate: Option<u32>,

        /// Target channel count
        #[arg(long)]
        channels: Option<u16>,

        /// Target sample width in bytes (1, 2 or 4)
        #[arg(long)]
        width: Option<u16>,
    },

    /// List silent stretches
    Silence {
        input: PathBuf,

        #[command(flatten)]
        scan: SilenceArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split a clip on silence into numbered files
    Split {
        input: PathBuf,

        /// Directory for the chunks
        #[arg(long)]
        out_dir: PathBuf,

        #[command(flatten)]
        scan: SilenceArgs,

        /// Silence kept around each chunk: ms, "all" or "off"
        #[arg(long, value_parser = parse_keep_silence)]
        keep: Option<KeepSilence>,
    },

    /// Remove leading and trailing silence
    Trim {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Silence threshold in dBFS
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,

        /// Scan step in ms
        #[arg(long)]
        chunk: Option<u64>,
    },

    /// Bring the peak to just below full scale
    Normalize {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Distance of the peak below 0 dBFS
        #[arg(long, default_value_t = 0.1)]
        headroom: f64,
    },
}

/// Overrides for the configured silence scan
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SilenceArgs {
    /// Shortest silence that counts, in ms
    #[arg(long)]
    pub min_len: Option<u64>,

    /// Threshold in dBFS, or dB below average with --relative
    #[arg(long, allow_hyphen_values = true)]
    pub threshold: Option<f64>,

    /// Measure the threshold relative to the clip's loudness
    #[arg(long, requires = "threshold")]
    pub relative: bool,

    /// Scan step in ms
    #[arg(long)]
    pub seek_step: Option<u64>,
}

fn parse_keep_silence(value: &str) -> Result<KeepSilence, String> {
    match value.to_ascii_lowercase().as_str() {
        "all" => Ok(KeepSilence::All),
        "off" | "none" => Ok(KeepSilence::Off),
        ms => ms
            .parse()
            .map(KeepSilence::Ms)
            .map_err(|_| format!("expected a number of ms, \"all\" or \"off\", got '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_keep_silence() {
        assert_eq!(parse_keep_silence("all"), Ok(KeepSilence::All));
        assert_eq!(parse_keep_silence("OFF"), Ok(KeepSilence::Off));
        assert_eq!(parse_keep_silence("250"), Ok(KeepSilence::Ms(250)));
        assert!(parse_keep_silence("-5").is_err());
    }

    #[test]
    fn test_relative_needs_threshold() {
        let missing = Cli::try_parse_from(["audioseg", "silence", "in.wav", "--relative"]);
        assert!(missing.is_err());

        let cli = Cli::parse_from(["audioseg", "silence", "in.wav", "--relative", "--threshold", "14"]);
        match cli.command {
            Some(Commands::Silence { scan, .. }) => {
                assert!(scan.relative);
                assert_eq!(scan.threshold, Some(14.0));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_overlay() {
        let cli = Cli::parse_from([
            "audioseg",
            "overlay",
            "base.wav",
            "click.wav",
            "-o",
            "out.wav",
            "--gain-during-overlay",
            "-6",
            "--loop",
        ]);
        match cli.command {
            Some(Commands::Overlay {
                gain_during_overlay,
                looped,
                position,
                ..
            }) => {
                assert_eq!(gain_during_overlay, Some(-6.0));
                assert!(looped);
                assert_eq!(position, 0);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
