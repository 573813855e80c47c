//! Integration Tests
//!
//! End-to-end tests through the public audioseg API.

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use test_case::test_case;

use audioseg::engine::{concat_all, SignalGenerator, Waveform};
use audioseg::{
    AudioBuffer, AudioCodec, AudioFormat, AudioSegError, CompressorParams, Config, ConverterCodec,
    ExportOptions, Fade, KeepSilence, Overlay, SampleWidth, SilenceOptions, SilenceThreshold,
};

/// Helper to create a test tone in the given format
fn tone(freq: f64, duration_ms: u64, format: AudioFormat) -> AudioBuffer {
    let mono = SignalGenerator::new(Waveform::Sine { freq })
        .with_sample_rate(format.frame_rate)
        .with_sample_width(format.sample_width)
        .to_audio_buffer(duration_ms, -12.0)
        .unwrap();
    mono.set_channels(format.channels).unwrap()
}

fn format(rate: u32, channels: u16, width: SampleWidth) -> AudioFormat {
    AudioFormat::new(rate, channels, width).unwrap()
}

fn offline_codec() -> AudioCodec {
    AudioCodec::new(ConverterCodec::new("/nonexistent/audioseg-converter"))
}

// === Algebraic Properties ===

#[test_case(format(8000, 1, SampleWidth::Int8) ; "8-bit mono")]
#[test_case(format(44100, 1, SampleWidth::Int16) ; "16-bit mono")]
#[test_case(format(22050, 2, SampleWidth::Int32) ; "32-bit stereo")]
fn test_concatenate_sums_frames(fmt: AudioFormat) {
    let a = tone(440.0, 730, fmt);
    let b = tone(220.0, 415, fmt);
    let joined = a.concatenate(&b).unwrap();
    assert_eq!(joined.frame_count(), a.frame_count() + b.frame_count());
    assert_eq!(a.append(&b, 0).unwrap(), joined);
}

#[test_case(format(8000, 1, SampleWidth::Int8) ; "8-bit mono")]
#[test_case(format(44100, 2, SampleWidth::Int16) ; "16-bit stereo")]
fn test_reverse_twice_is_identity(fmt: AudioFormat) {
    let clip = tone(330.0, 250, fmt).fade_in(100);
    assert_eq!(clip.reverse().reverse(), clip);
    assert_eq!(clip.reverse().raw_data().len(), clip.raw_data().len());
}

#[test]
fn test_gain_identity_and_round_trip() {
    let clip = tone(440.0, 200, format(44100, 2, SampleWidth::Int16));
    assert_eq!(clip.apply_gain(0.0).unwrap(), clip);

    let back = clip.apply_gain(3.0).unwrap().apply_gain(-3.0).unwrap();
    for (a, b) in clip.samples().iter().zip(back.samples()) {
        assert!((a - b).abs() <= 1, "{} vs {}", a, b);
    }
}

#[test]
fn test_gain_saturates_instead_of_failing() {
    let clip = tone(440.0, 100, format(8000, 1, SampleWidth::Int16));
    let loud = clip.apply_gain(40.0).unwrap();
    assert_eq!(loud.max(), 32768);
    assert!(loud.samples().iter().all(|s| (-32768..=32767).contains(s)));
}

#[test]
fn test_full_slice_keeps_every_frame() {
    let clip = tone(440.0, 1234, format(44100, 1, SampleWidth::Int16));
    let len = clip.duration_ms() as i64;
    assert_eq!(clip.slice(0..len).frame_count(), clip.frame_count());
}

#[test]
fn test_overlay_never_extends_base() {
    let base = tone(440.0, 1000, format(8000, 1, SampleWidth::Int16));
    let long_layer = tone(660.0, 3000, format(8000, 1, SampleWidth::Int16));
    let short_layer = tone(880.0, 100, format(8000, 1, SampleWidth::Int16));

    for overlay in [Overlay::at(0), Overlay::at(0).looped(), Overlay::at(0).times(50)] {
        assert_eq!(base.overlay(&long_layer, overlay).unwrap().duration_ms(), 1000);
        assert_eq!(base.overlay(&short_layer, overlay).unwrap().duration_ms(), 1000);
    }
}

// === Scenarios ===

#[test]
fn test_silent_buffer_levels() {
    let silent = AudioBuffer::silent(500, format(44100, 1, SampleWidth::Int16));
    assert_eq!(silent.dbfs(), f64::NEG_INFINITY);
    assert_eq!(silent.max(), 0);
    assert_eq!(silent.frame_count(), 22050);
}

#[test]
fn test_silence_relative_to_silent_average() {
    let silent = AudioBuffer::silent(1000, format(44100, 1, SampleWidth::Int16));
    let options = SilenceOptions {
        threshold: SilenceThreshold::BelowAverage(0.0),
        ..SilenceOptions::default()
    };
    assert_eq!(silent.detect_silence(&options).unwrap(), vec![0..1000]);
}

#[test]
fn test_chunks_of_twelve_seconds() {
    let clip = AudioBuffer::silent(12000, format(8000, 1, SampleWidth::Int8));
    let lengths: Vec<u64> = clip.chunks(5000).unwrap().map(|c| c.duration_ms()).collect();
    assert_eq!(lengths, vec![5000, 5000, 2000]);
}

#[test]
fn test_crossfade_longer_than_operand() {
    let a = AudioBuffer::silent(10000, format(8000, 1, SampleWidth::Int16));
    let b = AudioBuffer::silent(5000, format(8000, 1, SampleWidth::Int16));
    let err = a.append(&b, 6000).unwrap_err();
    assert!(matches!(err, AudioSegError::InvalidArgument { .. }));
}

// === Mixed Formats ===

#[test]
fn test_mixed_formats_normalize_to_widest() {
    let narrow = tone(440.0, 500, format(8000, 1, SampleWidth::Int8));
    let wide = tone(440.0, 500, format(16000, 2, SampleWidth::Int16));

    let joined = narrow.append(&wide, 100).unwrap();
    assert_eq!(joined.format(), format(16000, 2, SampleWidth::Int16));
    assert_eq!(joined.duration_ms(), 900);

    let total = concat_all([&narrow, &wide, &narrow]).unwrap();
    assert_eq!(total.duration_ms(), 1500);
    assert_eq!(total.format(), joined.format());
}

#[test]
fn test_ducking_overlay() {
    let bed = tone(220.0, 2000, format(8000, 1, SampleWidth::Int16));
    let voice = AudioBuffer::silent(500, format(8000, 1, SampleWidth::Int16));
    let ducked = bed
        .overlay(&voice, Overlay::at(1000).gain_during_overlay(-12.0))
        .unwrap();

    assert_abs_diff_eq!(ducked.slice(1000..1500).dbfs(), bed.dbfs() - 12.0, epsilon = 0.1);
    assert_eq!(ducked.slice(..1000), bed.slice(..1000));
    assert_eq!(ducked.slice(1500..), bed.slice(1500..));
}

#[test]
fn test_fade_then_split_on_silence() {
    let fmt = format(8000, 1, SampleWidth::Int16);
    let gap = AudioBuffer::silent(1500, fmt);
    let clip = concat_all([&tone(440.0, 1000, fmt), &gap, &tone(440.0, 1000, fmt)]).unwrap();

    let faded = clip.fade(Fade::new(0.0, -6.0).start(0).end(500)).unwrap();
    assert!(faded.slice(..500).dbfs() < clip.slice(..500).dbfs());

    let options = SilenceOptions {
        min_silence_len_ms: 1000,
        threshold: SilenceThreshold::Absolute(-60.0),
        seek_step_ms: 1,
    };
    let parts = faded.split_on_silence(&options, KeepSilence::Off).unwrap();
    let lengths: Vec<u64> = parts.iter().map(|p| p.duration_ms()).collect();
    assert_eq!(lengths, vec![1000, 1000]);
}

#[test]
fn test_effects_chain_keeps_length() {
    let clip = tone(440.0, 1000, format(44100, 2, SampleWidth::Int16));
    let processed = clip
        .high_pass_filter(80.0)
        .and_then(|c| c.compress_dynamic_range(&CompressorParams::default()))
        .and_then(|c| c.normalize(1.0))
        .unwrap();
    assert_eq!(processed.frame_count(), clip.frame_count());
    assert_abs_diff_eq!(processed.max_dbfs(), -1.0, epsilon = 0.01);
}

// === Codec Boundary ===

#[test_case(SampleWidth::Int8 ; "8-bit")]
#[test_case(SampleWidth::Int16 ; "16-bit")]
#[test_case(SampleWidth::Int32 ; "32-bit")]
fn test_wav_file_round_trip(width: SampleWidth) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let codec = offline_codec();
    let clip = tone(440.0, 300, format(22050, 2, width));

    codec.export(&clip, &path, None, &ExportOptions::default()).unwrap();
    assert_eq!(codec.from_file(&path, None, None).unwrap(), clip);
}

#[test]
fn test_missing_converter_is_a_codec_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.mp3");
    let clip = tone(440.0, 100, format(8000, 1, SampleWidth::Int16));

    let err = offline_codec()
        .export(&clip, &path, None, &ExportOptions::default())
        .unwrap_err();
    assert!(err.is_codec_error());
    assert_eq!(err.error_code(), "ENCODE_FAILURE");
    assert!(!path.exists());
}

#[test]
fn test_config_round_trip_feeds_codec() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audioseg.json");
    let config = Config {
        converter: Some(dir.path().join("no-such-converter")),
        crossfade_ms: 10,
        ..Config::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    let codec = AudioCodec::from_config(&loaded);
    assert_eq!(codec.converter().program(), dir.path().join("no-such-converter"));
}
