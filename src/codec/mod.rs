//! Codec-service boundary
//!
//! The core never touches containers or compressed formats. Decoding turns
//! bytes into the `(pcm, frame_rate, channels, sample_width)` contract of
//! [`AudioBuffer::new`]; encoding consumes the same. WAV and headerless PCM
//! are handled in-process; everything else goes through an external
//! converter process.

mod converter;

pub use converter::{find_converter, ConverterCodec};

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::{from_wav_bytes, to_wav_bytes, AudioBuffer, AudioFormat};
use crate::error::{AudioSegError, Result};

/// Canonical name for a format, with the usual aliases folded
pub fn normalize_format(format: &str) -> String {
    let lower = format.trim().trim_start_matches('.').to_ascii_lowercase();
    match lower.as_str() {
        "m4a" => "mp4".to_string(),
        "wave" => "wav".to_string(),
        _ => lower,
    }
}

/// Format implied by a file extension, if there is one
pub fn format_from_path(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(normalize_format)
}

fn is_pcm(format: &str) -> bool {
    matches!(format, "raw" | "pcm")
}

/// What the caller knows about the bytes being decoded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeHint {
    /// Container or codec name; `None` lets the converter probe
    pub format: Option<String>,
    /// Layout of headerless PCM input
    pub raw_format: Option<AudioFormat>,
}

impl DecodeHint {
    pub fn new(format: Option<&str>) -> Self {
        Self {
            format: format.map(normalize_format),
            raw_format: None,
        }
    }

    /// Headerless PCM with a known layout
    pub fn raw(format: AudioFormat) -> Self {
        Self {
            format: Some("raw".to_string()),
            raw_format: Some(format),
        }
    }
}

/// Encoder settings passed through to the converter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Codec name; `ogg` defaults to `libvorbis`
    pub codec: Option<String>,
    /// Target bitrate such as `128k`
    pub bitrate: Option<String>,
    /// Extra converter arguments, placed before the output format
    pub parameters: Vec<String>,
}

/// Something that can turn bytes into buffers and back
pub trait CodecService {
    /// Decode a byte stream into a buffer
    fn decode(&self, bytes: &[u8], hint: &DecodeHint) -> Result<AudioBuffer>;

    /// Encode a buffer into the named format
    fn encode(&self, buffer: &AudioBuffer, format: &str, options: &ExportOptions) -> Result<Vec<u8>>;
}

/// In-process codec for WAV and headerless PCM
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl CodecService for WavCodec {
    fn decode(&self, bytes: &[u8], hint: &DecodeHint) -> Result<AudioBuffer> {
        match hint.format.as_deref() {
            None | Some("wav") => from_wav_bytes(bytes),
            Some(format) if is_pcm(format) => {
                let layout = hint.raw_format.ok_or_else(|| {
                    AudioSegError::invalid("raw PCM input needs an explicit frame rate, channel count and sample width")
                })?;
                AudioBuffer::new(bytes.to_vec(), layout)
            }
            Some(other) => Err(AudioSegError::DecodeFailure {
                reason: format!("'{}' is not handled in-process", other),
                source: None,
            }),
        }
    }

    fn encode(&self, buffer: &AudioBuffer, format: &str, _options: &ExportOptions) -> Result<Vec<u8>> {
        match format {
            "wav" => to_wav_bytes(buffer),
            f if is_pcm(f) => Ok(buffer.raw_data().to_vec()),
            other => Err(AudioSegError::EncodeFailure {
                reason: format!("'{}' is not handled in-process", other),
                source: None,
            }),
        }
    }
}

/// Routes each format to the in-process codec or the converter
///
/// WAV input the in-process reader rejects (compressed WAV, odd headers)
/// gets a second chance through the converter.
#[derive(Debug, Clone)]
pub struct AudioCodec {
    wav: WavCodec,
    converter: ConverterCodec,
}

impl AudioCodec {
    pub fn new(converter: ConverterCodec) -> Self {
        Self {
            wav: WavCodec,
            converter,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ConverterCodec::from_config(config))
    }

    pub fn converter(&self) -> &ConverterCodec {
        &self.converter
    }

    /// Read and decode a file
    ///
    /// `format` overrides the extension; `raw` gives the layout of
    /// headerless PCM input.
    ///
    /// # Errors
    /// * `Io` - if the file cannot be read
    /// * `DecodeFailure` - if neither codec can decode it
    pub fn from_file(&self, path: &Path, format: Option<&str>, raw: Option<AudioFormat>) -> Result<AudioBuffer> {
        let bytes = fs::read(path)?;
        let hint = DecodeHint {
            format: format.map(normalize_format).or_else(|| format_from_path(path)),
            raw_format: raw,
        };
        debug!("Decoding {} as {:?}", path.display(), hint.format);
        self.decode(&bytes, &hint)
    }

    /// Encode a buffer and write it to `path`
    ///
    /// The format comes from `format`, else the extension, else WAV.
    pub fn export(&self, buffer: &AudioBuffer, path: &Path, format: Option<&str>, options: &ExportOptions) -> Result<()> {
        let format = format
            .map(normalize_format)
            .or_else(|| format_from_path(path))
            .unwrap_or_else(|| "wav".to_string());
        let bytes = self.encode(buffer, &format, options)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

impl CodecService for AudioCodec {
    fn decode(&self, bytes: &[u8], hint: &DecodeHint) -> Result<AudioBuffer> {
        match hint.format.as_deref() {
            Some(f) if is_pcm(f) => self.wav.decode(bytes, hint),
            Some("wav") => match self.wav.decode(bytes, hint) {
                Err(AudioSegError::DecodeFailure { reason, .. }) => {
                    debug!("In-process WAV decode failed ({}), trying converter", reason);
                    self.converter.decode(bytes, hint)
                }
                result => result,
            },
            _ => self.converter.decode(bytes, hint),
        }
    }

    fn encode(&self, buffer: &AudioBuffer, format: &str, options: &ExportOptions) -> Result<Vec<u8>> {
        let format = normalize_format(format);
        if format == "wav" || is_pcm(&format) {
            self.wav.encode(buffer, &format, options)
        } else {
            self.converter.encode(buffer, &format, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SampleWidth;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use test_case::test_case;

    fn offline() -> AudioCodec {
        AudioCodec::new(ConverterCodec::new("/nonexistent/audioseg-converter"))
    }

    fn clip() -> AudioBuffer {
        let format = AudioFormat::new(8000, 2, SampleWidth::Int16).unwrap();
        AudioBuffer::from_samples(&[0, 1, -2, 3, 400, -500], format).unwrap()
    }

    #[test_case("WAV", "wav")]
    #[test_case(".wave", "wav")]
    #[test_case("m4a", "mp4")]
    #[test_case("Ogg", "ogg")]
    fn test_normalize_format(input: &str, expected: &str) {
        assert_eq!(normalize_format(input), expected);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(format_from_path(Path::new("take.M4A")), Some("mp4".to_string()));
        assert_eq!(format_from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_wav_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let codec = offline();

        codec.export(&clip(), &path, None, &ExportOptions::default()).unwrap();
        assert_eq!(codec.from_file(&path, None, None).unwrap(), clip());
    }

    #[test]
    fn test_raw_needs_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.pcm");
        let codec = offline();
        codec.export(&clip(), &path, None, &ExportOptions::default()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), clip().raw_data());

        let err = codec.from_file(&path, None, None).unwrap_err();
        assert!(matches!(err, AudioSegError::InvalidArgument { .. }));

        let decoded = codec.from_file(&path, Some("raw"), Some(clip().format())).unwrap();
        assert_eq!(decoded, clip());
    }

    #[test]
    fn test_broken_wav_falls_back_to_converter() {
        let err = offline()
            .decode(b"RIFF garbage", &DecodeHint::new(Some("wav")))
            .unwrap_err();
        // The converter is missing, so the fallback reports the failure
        assert!(err.is_codec_error());
        assert!(err.to_string().contains("audioseg-converter"));
    }

    #[test]
    fn test_compressed_formats_need_converter() {
        let codec = offline();
        let err = codec.encode(&clip(), "mp3", &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, AudioSegError::EncodeFailure { .. }));

        let err = WavCodec.decode(b"ID3", &DecodeHint::new(Some("mp3"))).unwrap_err();
        assert!(matches!(err, AudioSegError::DecodeFailure { .. }));
    }

    #[test]
    fn test_export_options_from_json() {
        let options: ExportOptions = serde_json::from_str(r#"{"bitrate": "192k"}"#).unwrap();
        assert_eq!(options.bitrate.as_deref(), Some("192k"));
        assert!(options.codec.is_none());
        assert!(options.parameters.is_empty());
    }
}
