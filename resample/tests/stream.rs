//! End-to-end stream tests against the default engine.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use giztoy_resample::{Config, Quality, ResampleError, SampleFormat, StreamResampler};

/// Records every write so ordering can be checked.
#[derive(Clone, Default)]
struct Recorder {
    writes: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl Recorder {
    fn bytes(&self) -> Vec<u8> {
        self.writes.borrow().concat()
    }
}

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.borrow_mut().push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Interleaved 16-bit sine, same signal on every channel.
fn sine_i16(frames: usize, channels: usize, rate: f64, freq: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames * channels * 2);
    for i in 0..frames {
        let v = (2.0 * std::f64::consts::PI * freq * i as f64 / rate).sin() * 0.4;
        let s = (v * 32767.0) as i16;
        for _ in 0..channels {
            out.extend_from_slice(&s.to_le_bytes());
        }
    }
    out
}

#[test]
fn test_one_second_stereo_16k_to_8k() {
    let input = sine_i16(16000, 2, 16000.0, 440.0);
    assert_eq!(input.len(), 64000);

    let sink = Recorder::default();
    let mut r = StreamResampler::new(sink.clone(), Config::new(16000.0, 8000.0, 2)).unwrap();
    assert_eq!(r.resample(&input).unwrap(), 64000);
    r.close().unwrap();

    // 8000 frames of 2 channels: 16000 samples, 32000 bytes.
    let out = sink.bytes();
    assert!(out.len().abs_diff(32000) <= 4, "got {} bytes", out.len());
    assert_eq!(r.stats().frames_in, 16000);
    assert_eq!(r.stats().bytes_out, out.len() as u64);
}

#[test]
fn test_equal_rates_round_trip_frame_count() {
    for format in [
        SampleFormat::Float32,
        SampleFormat::Float64,
        SampleFormat::Int32,
        SampleFormat::Int16,
    ] {
        let input = sine_i16(5000, 3, 22050.0, 300.0);
        let cfg = Config::new(22050.0, 22050.0, 3).with_formats(SampleFormat::Int16, format);
        let mut out = Vec::new();
        let mut r = StreamResampler::new(&mut out, cfg).unwrap();
        for chunk in input.chunks(6 * 100) {
            r.resample(chunk).unwrap();
        }
        r.close().unwrap();
        drop(r);
        assert_eq!(out.len(), 5000 * 3 * format.byte_width(), "format {format}");
    }
}

#[test]
fn test_sustained_downsampling_frame_count() {
    let ratios = [(48000.0, 16000.0), (44100.0, 22050.0), (48000.0, 44100.0), (96000.0, 8000.0)];
    for (input_rate, output_rate) in ratios {
        let frames = 30000;
        let input = sine_i16(frames, 2, input_rate, 200.0);
        let cfg = Config::new(input_rate, output_rate, 2).with_quality(Quality::Medium);
        let mut out = Vec::new();
        let mut r = StreamResampler::new(&mut out, cfg).unwrap();
        for chunk in input.chunks(4 * 1500) {
            r.resample(chunk).unwrap();
        }
        r.close().unwrap();
        drop(r);

        let expected = frames as f64 * output_rate / input_rate;
        let got = (out.len() / 4) as f64;
        assert!(
            (got - expected).abs() <= 1.0,
            "{input_rate} -> {output_rate}: got {got}, expected {expected}"
        );
    }
}

#[test]
fn test_upsampling_with_threads() {
    let input = sine_i16(11025, 4, 11025.0, 500.0);
    let cfg = Config::new(11025.0, 48000.0, 4)
        .with_formats(SampleFormat::Int16, SampleFormat::Float32)
        .with_threads(4);
    let mut out = Vec::new();
    let mut r = StreamResampler::new(&mut out, cfg).unwrap();
    for chunk in input.chunks(8 * 2048) {
        r.resample(chunk).unwrap();
    }
    r.close().unwrap();
    drop(r);

    assert_eq!(out.len() / 16, 48000);

    // All channels carry the same signal.
    for frame in out.chunks_exact(16).skip(100).take(1000) {
        let first = &frame[..4];
        assert!(frame.chunks_exact(4).all(|s| s == first));
    }
}

#[test]
fn test_reset_separates_streams() {
    let first = Recorder::default();
    let second = Recorder::default();
    let mut r = StreamResampler::new(first.clone(), Config::new(32000.0, 16000.0, 1)).unwrap();

    let input = sine_i16(3200, 1, 32000.0, 1000.0);
    for chunk in input.chunks(640) {
        r.resample(chunk).unwrap();
    }
    r.reset(second.clone()).unwrap();
    let after_reset = first.bytes().len();
    assert_eq!(after_reset, 1600 * 2);

    r.resample(&input).unwrap();
    r.close().unwrap();

    assert_eq!(first.bytes().len(), after_reset);
    assert_eq!(second.bytes().len(), 1600 * 2);
}

#[test]
fn test_io_copy_into_resampler() {
    let input = sine_i16(8000, 1, 8000.0, 100.0);
    let mut out = Vec::new();
    let mut r = StreamResampler::new(&mut out, Config::new(8000.0, 16000.0, 1)).unwrap();
    let copied = io::copy(&mut io::Cursor::new(input), &mut r).unwrap();
    assert_eq!(copied, 16000);
    r.close().unwrap();
    drop(r);
    assert_eq!(out.len(), 32000);
}

#[test]
fn test_misuse_after_close() {
    let mut out = Vec::new();
    let mut r = StreamResampler::new(&mut out, Config::new(8000.0, 16000.0, 1)).unwrap();
    r.close().unwrap();
    assert!(matches!(r.close(), Err(ResampleError::Closed)));
    assert!(matches!(r.resample(&[0, 0]), Err(ResampleError::Closed)));
    drop(r);
    assert!(out.is_empty());
}

#[test]
fn test_invalid_output_rate_writes_nothing() {
    let sink = Recorder::default();
    let result = StreamResampler::new(sink.clone(), Config::new(16000.0, 0.0, 2));
    assert!(matches!(result, Err(ResampleError::InvalidRate { .. })));
    assert!(sink.writes.borrow().is_empty());
}

#[test]
fn test_single_frame_writes_keep_up() {
    let frames = 20000;
    let input = sine_i16(frames, 1, 44100.0, 300.0);
    let cfg = Config::new(44100.0, 48000.0, 1).with_quality(Quality::Quick);
    let mut out = Vec::new();
    let mut r = StreamResampler::new(&mut out, cfg).unwrap();
    for frame in input.chunks(2) {
        r.resample(frame).unwrap();
    }

    // Without catching up, each write could only emit one frame.
    let expected = (frames as f64 * 48000.0 / 44100.0).round() as u64;
    let before_close = r.stats().frames_out;
    assert!(before_close > frames as u64, "only {before_close} frames before close");
    assert!(expected - before_close < 1500, "{before_close} of {expected} frames");

    r.close().unwrap();
    assert_eq!(r.stats().frames_out, expected);
}

#[test]
fn test_into_inner_returns_owned_destination() {
    let input = sine_i16(4000, 2, 16000.0, 440.0);
    let mut r = StreamResampler::new(Vec::new(), Config::new(16000.0, 8000.0, 2)).unwrap();
    r.resample(&input).unwrap();
    r.close().unwrap();
    let out: Vec<u8> = r.into_inner();
    assert_eq!(out.len(), 2000 * 4);
}
