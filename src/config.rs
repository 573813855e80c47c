//! Configuration
//!
//! A plain value loaded from JSON and handed to whatever needs it. Missing
//! fields take their defaults, so an empty object is a valid file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::find_converter;
use crate::engine::{KeepSilence, SilenceOptions, DEFAULT_CROSSFADE_MS};
use crate::error::{AudioSegError, Result};

/// Settings for the codec boundary and the command-line defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External converter binary; searched on PATH when unset
    pub converter: Option<PathBuf>,
    /// Crossfade used when joining clips
    pub crossfade_ms: u64,
    /// Silence scan used by `silence` and `split`
    pub silence: SilenceOptions,
    /// Padding kept around split chunks
    pub keep_silence: KeepSilence,
    /// Level below which leading/trailing audio is trimmed
    pub leading_silence_threshold_db: f64,
    /// Step used when trimming
    pub leading_silence_chunk_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            converter: None,
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            silence: SilenceOptions::default(),
            keep_silence: KeepSilence::default(),
            leading_silence_threshold_db: -50.0,
            leading_silence_chunk_ms: 10,
        }
    }
}

impl Config {
    /// Load a configuration file
    ///
    /// # Errors
    /// * `Io` - if the file cannot be read
    /// * `Config` - if it is not valid JSON or holds invalid values
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(|e| AudioSegError::Config {
            reason: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde cannot
    ///
    /// # Errors
    /// * `Config` - for an invalid silence scan or a zero trim step
    pub fn validate(&self) -> Result<()> {
        self.silence.validate().map_err(|e| AudioSegError::Config {
            reason: format!("silence: {}", e),
        })?;
        if self.leading_silence_chunk_ms == 0 {
            return Err(AudioSegError::Config {
                reason: "leading_silence_chunk_ms must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Converter to run: the configured one, else whatever PATH offers
    pub fn converter_path(&self) -> PathBuf {
        self.converter.clone().unwrap_or_else(find_converter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SilenceThreshold;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.crossfade_ms, 100);
        assert_eq!(config.silence.min_silence_len_ms, 1000);
        assert_eq!(config.silence.threshold, SilenceThreshold::Absolute(-16.0));
        assert_eq!(config.keep_silence, KeepSilence::Ms(100));
        assert_eq!(config.leading_silence_threshold_db, -50.0);
        assert!(config.converter.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audioseg.json");

        let config = Config {
            converter: Some(PathBuf::from("/opt/bin/ffmpeg")),
            crossfade_ms: 250,
            keep_silence: KeepSilence::All,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"crossfade_ms": 40, "keep_silence": "off"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.crossfade_ms, 40);
        assert_eq!(config.keep_silence, KeepSilence::Off);
        assert_eq!(config.silence, SilenceOptions::default());
    }

    #[test]
    fn test_invalid_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(AudioSegError::Config { .. })));

        fs::write(&path, r#"{"silence": {"seek_step_ms": 0}}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(AudioSegError::Config { .. })));

        let missing = Config::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(AudioSegError::Io(_))));
    }

    #[test]
    fn test_explicit_converter_wins() {
        let config = Config {
            converter: Some(PathBuf::from("/usr/local/bin/avconv")),
            ..Config::default()
        };
        assert_eq!(config.converter_path(), PathBuf::from("/usr/local/bin/avconv"));
        assert!(!Config::default().converter_path().as_os_str().is_empty());
    }
}
