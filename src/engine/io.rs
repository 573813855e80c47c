//! WAV boundary adapter
//!
//! Maps WAV headers to the `(bytes, frame_rate, channels, sample_width)`
//! contract of [`AudioBuffer::from_raw`] and back. 24-bit input is widened
//! to 32-bit by shifting left 8 bits; 32-bit float input is scaled to
//! 32-bit integers. Output is always integer PCM at the buffer's own width.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::engine::format::{AudioFormat, SampleWidth};
use crate::error::{AudioSegError, Result};

/// Decode a WAV stream
///
/// # Errors
/// * `DecodeFailure` - if the stream is not a readable WAV file
/// * `UnsupportedSampleWidth` - for integer depths other than 8, 16, 24 or 32 bits
pub fn read_wav<R: Read>(reader: R) -> Result<AudioBuffer> {
    let mut reader = WavReader::new(reader).map_err(|e| decode_error("failed to read WAV header", e))?;
    let spec = reader.spec();

    let (width, samples) = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => (SampleWidth::Int8, collect(reader.samples::<i8>(), i32::from)?),
        (SampleFormat::Int, 16) => (SampleWidth::Int16, collect(reader.samples::<i16>(), i32::from)?),
        (SampleFormat::Int, 24) => (SampleWidth::Int32, collect(reader.samples::<i32>(), |s| s << 8)?),
        (SampleFormat::Int, 32) => (SampleWidth::Int32, collect(reader.samples::<i32>(), |s| s)?),
        (SampleFormat::Float, 32) => {
            let full_scale = SampleWidth::Int32.max_possible_amplitude();
            let quantize = |s: f32| SampleWidth::Int32.quantize(s as f64 * full_scale);
            (SampleWidth::Int32, collect(reader.samples::<f32>(), quantize)?)
        }
        (_, bits) => {
            return Err(AudioSegError::UnsupportedSampleWidth {
                width: bits.div_ceil(8),
            })
        }
    };

    let format = AudioFormat::new(spec.sample_rate, spec.channels, width)?;
    AudioBuffer::from_samples(&samples, format)
}

/// Encode a buffer as integer PCM WAV
///
/// # Errors
/// * `EncodeFailure` - if the writer fails
pub fn write_wav<W: Write + Seek>(buffer: &AudioBuffer, writer: W) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.frame_rate(),
        bits_per_sample: buffer.sample_width().bits() as u16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::new(writer, spec).map_err(|e| encode_error("failed to write WAV header", e))?;

    let width = buffer.sample_width();
    for sample in buffer.samples() {
        let written = match width {
            SampleWidth::Int8 => writer.write_sample(sample as i8),
            SampleWidth::Int16 => writer.write_sample(sample as i16),
            SampleWidth::Int32 => writer.write_sample(sample),
        };
        written.map_err(|e| encode_error("failed to write samples", e))?;
    }

    writer
        .finalize()
        .map_err(|e| encode_error("failed to finalize WAV file", e))
}

/// Read a WAV file from disk
///
/// # Errors
/// * `Io` - if the file cannot be opened
/// * `DecodeFailure` - if it is not a readable WAV file
pub fn read_wav_file(path: &Path) -> Result<AudioBuffer> {
    let file = File::open(path)?;
    read_wav(BufReader::new(file))
}

/// Write a WAV file to disk, replacing any existing file
pub fn write_wav_file(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_wav(buffer, BufWriter::new(file))
}

/// Decode WAV bytes held in memory
pub fn from_wav_bytes(bytes: &[u8]) -> Result<AudioBuffer> {
    read_wav(Cursor::new(bytes))
}

/// Encode a buffer to in-memory WAV bytes
pub fn to_wav_bytes(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(buffer, &mut cursor)?;
    Ok(cursor.into_inner())
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn collect<S, I, F>(samples: I, convert: F) -> Result<Vec<i32>>
where
    I: Iterator<Item = hound::Result<S>>,
    F: Fn(S) -> i32,
{
    samples
        .map(|s| s.map(&convert))
        .collect::<std::result::Result<Vec<i32>, _>>()
        .map_err(|e| decode_error("failed to read samples", e))
}

fn decode_error(context: &str, e: hound::Error) -> AudioSegError {
    AudioSegError::DecodeFailure {
        reason: format!("{}: {}", context, e),
        source: Some(Box::new(e)),
    }
}

fn encode_error(context: &str, e: hound::Error) -> AudioSegError {
    AudioSegError::EncodeFailure {
        reason: format!("{}: {}", context, e),
        source: Some(Box::new(e)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generators::{SignalGenerator, Waveform};
    use tempfile::tempdir;
    use test_case::test_case;

    fn tone(width: SampleWidth, channels: u16) -> AudioBuffer {
        let mono = SignalGenerator::new(Waveform::Sine { freq: 440.0 })
            .with_sample_width(width)
            .to_audio_buffer(200, -3.0)
            .unwrap();
        mono.set_channels(channels).unwrap()
    }

    #[test_case(SampleWidth::Int8, 1)]
    #[test_case(SampleWidth::Int16, 1)]
    #[test_case(SampleWidth::Int16, 2)]
    #[test_case(SampleWidth::Int32, 2)]
    fn test_round_trip_file(width: SampleWidth, channels: u16) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("round_trip.wav");

        let original = tone(width, channels);
        write_wav_file(&original, &path).unwrap();
        let imported = read_wav_file(&path).unwrap();

        assert_eq!(imported.format(), original.format());
        assert_eq!(imported, original);
    }

    #[test]
    fn test_round_trip_bytes() {
        let original = tone(SampleWidth::Int16, 2);
        let bytes = to_wav_bytes(&original).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(from_wav_bytes(&bytes).unwrap(), original);
    }

    #[test]
    fn test_24_bit_is_widened() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0x12_3456_i32).unwrap();
            writer.write_sample(-1_i32).unwrap();
            writer.finalize().unwrap();
        }
        let seg = from_wav_bytes(cursor.get_ref()).unwrap();
        assert_eq!(seg.sample_width(), SampleWidth::Int32);
        assert_eq!(seg.samples(), vec![0x1234_5600, -256]);
    }

    #[test]
    fn test_float_is_quantized() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.5_f32).unwrap();
            writer.write_sample(-1.0_f32).unwrap();
            writer.write_sample(1.0_f32).unwrap();
            writer.finalize().unwrap();
        }
        let seg = from_wav_bytes(cursor.get_ref()).unwrap();
        assert_eq!(seg.samples(), vec![1 << 30, i32::MIN, i32::MAX]);
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let result = from_wav_bytes(b"definitely not a wav file");
        match result {
            Err(AudioSegError::DecodeFailure { reason, .. }) => {
                assert!(reason.contains("header"));
            }
            other => panic!("Expected DecodeFailure, got: {:?}", other),
        }
    }

    #[test]
    fn test_read_nonexistent_file() {
        let result = read_wav_file(Path::new("/nonexistent/path/audio.wav"));
        match result {
            Err(AudioSegError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }
}
