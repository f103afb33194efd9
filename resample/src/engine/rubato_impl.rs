//! Rubato-based engine.
//!
//! Pure Rust sample rate conversion using the rubato library. Channels are
//! split into lanes, each with its own interpolator, and lanes are filtered
//! concurrently on a worker pool owned by the engine.

use std::ops::Range;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rubato::{
    FastFixedIn, PolynomialDegree, Resampler as _, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use tracing::debug;

use super::{Engine, Progress};
use crate::codec;
use crate::config::EngineSpec;
use crate::error::EngineError;
use crate::format::Quality;

/// Input frames per interpolator call.
const CHUNK_FRAMES: usize = 1024;

enum Interpolator {
    Poly(FastFixedIn<f64>),
    Sinc(SincFixedIn<f64>),
}

macro_rules! dispatch {
    ($interp:expr, $r:ident => $body:expr) => {
        match $interp {
            Interpolator::Poly($r) => $body,
            Interpolator::Sinc($r) => $body,
        }
    };
}

impl Interpolator {
    fn new(quality: Quality, ratio: f64, channels: usize) -> Result<Self, EngineError> {
        let (sinc_len, f_cutoff, oversampling_factor, interpolation, window) = match quality {
            Quality::Quick => {
                let poly = FastFixedIn::new(
                    ratio,
                    1.0,
                    PolynomialDegree::Cubic,
                    CHUNK_FRAMES,
                    channels,
                )?;
                return Ok(Self::Poly(poly));
            }
            Quality::Low => (64, 0.90, 128, SincInterpolationType::Linear, WindowFunction::Hann2),
            Quality::Medium => (
                128,
                0.925,
                256,
                SincInterpolationType::Linear,
                WindowFunction::Blackman2,
            ),
            Quality::High => (
                256,
                0.95,
                256,
                SincInterpolationType::Cubic,
                WindowFunction::BlackmanHarris2,
            ),
            Quality::VeryHigh => (
                512,
                0.97,
                512,
                SincInterpolationType::Cubic,
                WindowFunction::BlackmanHarris2,
            ),
        };

        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff,
            interpolation,
            oversampling_factor,
            window,
        };
        let sinc = SincFixedIn::new(ratio, 1.0, params, CHUNK_FRAMES, channels)?;
        Ok(Self::Sinc(sinc))
    }

    fn input_frames_next(&self) -> usize {
        dispatch!(self, r => r.input_frames_next())
    }

    fn output_frames_max(&self) -> usize {
        dispatch!(self, r => r.output_frames_max())
    }

    fn output_delay(&self) -> usize {
        dispatch!(self, r => r.output_delay())
    }

    fn reset(&mut self) {
        dispatch!(self, r => r.reset())
    }

    fn process(
        &mut self,
        input: &[&[f64]],
        output: &mut [Vec<f64>],
    ) -> Result<(usize, usize), EngineError> {
        Ok(dispatch!(self, r => r.process_into_buffer(input, output, None))?)
    }
}

/// A group of channels resampled by one interpolator.
struct Lane {
    /// Interleaved channel indices handled by this lane.
    channels: Range<usize>,
    interpolator: Interpolator,
    /// Input not yet filling a whole chunk, per channel.
    pending: Vec<Vec<f64>>,
    /// Resampled output not yet emitted, per channel.
    ready: Vec<Vec<f64>>,
    scratch: Vec<Vec<f64>>,
    /// Leading output frames still to drop for delay compensation.
    skip: usize,
}

impl Lane {
    fn new(channels: Range<usize>, quality: Quality, ratio: f64) -> Result<Self, EngineError> {
        let n = channels.len();
        let interpolator = Interpolator::new(quality, ratio, n)?;
        let skip = interpolator.output_delay();
        let scratch = vec![vec![0.0; interpolator.output_frames_max()]; n];
        Ok(Self {
            channels,
            interpolator,
            pending: vec![Vec::new(); n],
            ready: vec![Vec::new(); n],
            scratch,
            skip,
        })
    }

    fn pending_frames(&self) -> usize {
        self.pending[0].len()
    }

    fn ready_frames(&self) -> usize {
        self.ready[0].len()
    }

    /// Appends this lane's channels from interleaved samples.
    fn push(&mut self, samples: &[f64], total_channels: usize) {
        for frame in samples.chunks_exact(total_channels) {
            let frame = &frame[self.channels.clone()];
            for (dst, &s) in self.pending.iter_mut().zip(frame) {
                dst.push(s);
            }
        }
    }

    /// Runs every complete chunk of pending input through the interpolator.
    fn run(&mut self) -> Result<(), EngineError> {
        let mut start = 0;
        loop {
            let need = self.interpolator.input_frames_next();
            if self.pending_frames() - start < need {
                break;
            }

            let input: Vec<&[f64]> = self
                .pending
                .iter()
                .map(|ch| &ch[start..start + need])
                .collect();
            let (read, written) = self.interpolator.process(&input, &mut self.scratch)?;
            if read == 0 {
                break;
            }
            start += read;

            let skip = self.skip.min(written);
            self.skip -= skip;
            for (dst, src) in self.ready.iter_mut().zip(&self.scratch) {
                dst.extend_from_slice(&src[skip..written]);
            }
        }

        for ch in &mut self.pending {
            ch.drain(..start);
        }
        Ok(())
    }

    /// Pads the input with silence until `needed` frames are ready, then
    /// truncates the ready output to exactly `needed` frames.
    fn finish(&mut self, needed: usize, ratio: f64) -> Result<(), EngineError> {
        let budget = ((needed + self.skip) as f64 / ratio).ceil() as usize + 2 * CHUNK_FRAMES;
        let mut fed = 0;
        while self.ready_frames() < needed && fed <= budget {
            let need = self.interpolator.input_frames_next();
            let have = self.pending_frames();
            for ch in &mut self.pending {
                ch.resize(have.max(need), 0.0);
            }
            fed += need.saturating_sub(have);
            self.run()?;
        }

        for ch in &mut self.pending {
            ch.clear();
        }
        for ch in &mut self.ready {
            ch.truncate(needed);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.interpolator.reset();
        self.skip = self.interpolator.output_delay();
        for ch in self.pending.iter_mut().chain(self.ready.iter_mut()) {
            ch.clear();
        }
    }
}

/// Splits `channels` into at most `threads` contiguous lanes.
fn split_lanes(channels: usize, threads: usize) -> Vec<Range<usize>> {
    let n = threads.clamp(1, channels.max(1));
    let base = channels / n;
    let extra = channels % n;
    let mut lanes = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = base + usize::from(i < extra);
        lanes.push(start..start + len);
        start += len;
    }
    lanes
}

/// Applies `op` to every lane, spreading lanes over `pool` when there are
/// several.
fn run_lanes<F>(pool: Option<&ThreadPool>, lanes: &mut [Lane], op: F) -> Result<(), EngineError>
where
    F: Fn(&mut Lane) -> Result<(), EngineError> + Sync,
{
    match (pool, lanes) {
        (_, [lane]) => op(lane),
        (Some(pool), lanes) => pool.install(|| lanes.par_iter_mut().try_for_each(|lane| op(lane))),
        (None, lanes) => lanes.iter_mut().try_for_each(op),
    }
}

/// Builds the pool that filters lanes. None for a single lane.
fn lane_pool(lanes: usize) -> Result<Option<ThreadPool>, EngineError> {
    if lanes <= 1 {
        return Ok(None);
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(lanes)
        .thread_name(|i| format!("resample-lane-{i}"))
        .build()?;
    Ok(Some(pool))
}

/// Engine backed by rubato interpolators.
///
/// Output is delay compensated: the first emitted frame corresponds to the
/// first input frame. After [`Engine::flush`] the total number of emitted
/// frames is `round(input_frames * ratio)`.
///
/// When input and output rates are equal no filtering happens and only the
/// sample format is converted.
pub struct RubatoEngine {
    spec: EngineSpec,
    ratio: f64,
    /// Empty when rates are equal.
    lanes: Vec<Lane>,
    /// Workers for multi-lane filtering, created once with the engine.
    pool: Option<ThreadPool>,
    decoded: Vec<f64>,
    interleaved: Vec<f64>,
    /// Input frames accepted since the last clear.
    consumed: u64,
    /// Output frames emitted since the last clear.
    emitted: u64,
    finished: bool,
}

impl RubatoEngine {
    /// Creates an engine for the given spec.
    pub fn new(spec: &EngineSpec) -> Result<Self, EngineError> {
        let ratio = spec.ratio();
        let lanes = if ratio == 1.0 {
            Vec::new()
        } else {
            split_lanes(spec.channels, spec.threads)
                .into_iter()
                .map(|channels| Lane::new(channels, spec.quality, ratio))
                .collect::<Result<Vec<_>, _>>()?
        };

        let pool = lane_pool(lanes.len())?;

        debug!(
            ratio,
            lanes = lanes.len(),
            quality = %spec.quality,
            "rubato engine created"
        );

        Ok(Self {
            spec: *spec,
            ratio,
            lanes,
            pool,
            decoded: Vec::new(),
            interleaved: Vec::new(),
            consumed: 0,
            emitted: 0,
            finished: false,
        })
    }

    /// Returns the spec the engine was created with.
    pub fn spec(&self) -> &EngineSpec {
        &self.spec
    }

    /// Returns the number of lanes filtered in parallel (0 when bypassing).
    pub fn lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Returns the number of pool worker threads (0 when lanes run inline).
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(0, ThreadPool::current_num_threads)
    }

    /// Moves up to `capacity` ready frames into `output`.
    fn emit(&mut self, output: &mut [u8], capacity: usize) -> usize {
        let Some(first) = self.lanes.first() else {
            return 0;
        };
        let frames = first.ready_frames().min(capacity);
        if frames == 0 {
            return 0;
        }

        let channels = self.spec.channels;
        self.interleaved.clear();
        self.interleaved.resize(frames * channels, 0.0);
        for lane in &mut self.lanes {
            for (j, ch) in lane.ready.iter_mut().enumerate() {
                let c = lane.channels.start + j;
                for (i, s) in ch.drain(..frames).enumerate() {
                    self.interleaved[i * channels + c] = s;
                }
            }
        }

        codec::encode(self.spec.output_format, &self.interleaved, output);
        self.emitted += frames as u64;
        frames
    }
}

impl Engine for RubatoEngine {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress, EngineError> {
        if self.finished {
            return Err(EngineError::new("input after flush, clear the engine first"));
        }

        let in_frame = self.spec.input_frame_bytes();
        let frames_in = input.len() / in_frame;
        let capacity = output.len() / self.spec.output_frame_bytes();
        let channels = self.spec.channels;

        if self.lanes.is_empty() {
            let frames = frames_in.min(capacity);
            self.decoded.clear();
            codec::decode(self.spec.input_format, &input[..frames * in_frame], &mut self.decoded);
            codec::encode(self.spec.output_format, &self.decoded, output);
            self.consumed += frames as u64;
            self.emitted += frames as u64;
            return Ok(Progress {
                frames_consumed: frames,
                frames_produced: frames,
            });
        }

        self.decoded.clear();
        codec::decode(self.spec.input_format, &input[..frames_in * in_frame], &mut self.decoded);
        for lane in &mut self.lanes {
            lane.push(&self.decoded, channels);
        }
        run_lanes(self.pool.as_ref(), &mut self.lanes, Lane::run)?;
        self.consumed += frames_in as u64;

        let produced = self.emit(output, capacity);
        Ok(Progress {
            frames_consumed: frames_in,
            frames_produced: produced,
        })
    }

    fn flush(&mut self, output: &mut [u8]) -> Result<usize, EngineError> {
        let capacity = output.len() / self.spec.output_frame_bytes();

        if !self.finished && !self.lanes.is_empty() {
            let target = (self.consumed as f64 * self.ratio).round() as u64;
            let needed = target.saturating_sub(self.emitted) as usize;
            let ratio = self.ratio;
            run_lanes(self.pool.as_ref(), &mut self.lanes, |lane| {
                lane.finish(needed, ratio)
            })?;
            debug!(consumed = self.consumed, target, "rubato engine drained");
        }
        self.finished = true;

        Ok(self.emit(output, capacity))
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        for lane in &mut self.lanes {
            lane.reset();
        }
        self.consumed = 0;
        self.emitted = 0;
        self.finished = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::format::SampleFormat;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn spec(input_rate: f64, output_rate: f64, channels: usize, threads: usize) -> EngineSpec {
        Config::new(input_rate, output_rate, channels)
            .with_threads(threads)
            .engine_spec()
            .unwrap()
    }

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Feeds `input` in chunks of `chunk` frames, then drains; returns all output.
    fn run_all(engine: &mut RubatoEngine, input: &[u8], chunk_frames: usize) -> Vec<u8> {
        let in_frame = engine.spec().input_frame_bytes();
        let out_frame = engine.spec().output_frame_bytes();
        let ratio = engine.spec().ratio();
        let mut out = Vec::new();
        for chunk in input.chunks(chunk_frames * in_frame) {
            let frames = chunk.len() / in_frame;
            let cap = ((frames as f64 * ratio) as usize).max(1);
            let mut buf = vec![0u8; cap * out_frame];
            let p = engine.process(chunk, &mut buf).unwrap();
            assert_eq!(p.frames_consumed, frames);
            out.extend_from_slice(&buf[..p.frames_produced * out_frame]);
        }
        let mut buf = vec![0u8; 4096 * out_frame];
        loop {
            let n = engine.flush(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n * out_frame]);
            if n < 4096 {
                break;
            }
        }
        out
    }

    fn sine(frames: usize, channels: usize, rate: f64, freq: f64) -> Vec<i16> {
        (0..frames)
            .flat_map(|i| {
                let v = (2.0 * std::f64::consts::PI * freq * i as f64 / rate).sin() * 0.5;
                std::iter::repeat_n((v * 32767.0) as i16, channels)
            })
            .collect()
    }

    #[test]
    fn test_split_lanes() {
        assert_eq!(split_lanes(2, 8), vec![0..1, 1..2]);
        assert_eq!(split_lanes(5, 2), vec![0..3, 3..5]);
        assert_eq!(split_lanes(6, 1), vec![0..6]);
        assert_eq!(split_lanes(3, 3), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_lane_count_follows_threads() {
        let engine = RubatoEngine::new(&spec(48000.0, 16000.0, 2, 4)).unwrap();
        assert_eq!(engine.lanes(), 2);
        let engine = RubatoEngine::new(&spec(48000.0, 16000.0, 2, 1)).unwrap();
        assert_eq!(engine.lanes(), 1);
        let engine = RubatoEngine::new(&spec(16000.0, 16000.0, 2, 4)).unwrap();
        assert_eq!(engine.lanes(), 0);
    }

    #[test]
    fn test_workers_created_once() {
        let mut engine = RubatoEngine::new(&spec(48000.0, 16000.0, 2, 2)).unwrap();
        assert_eq!(engine.workers(), 2);
        assert_eq!(RubatoEngine::new(&spec(48000.0, 16000.0, 2, 1)).unwrap().workers(), 0);

        let seen = Mutex::new(HashSet::new());
        for _ in 0..50 {
            run_lanes(engine.pool.as_ref(), &mut engine.lanes, |_| {
                seen.lock().unwrap().insert(std::thread::current().id());
                Ok(())
            })
            .unwrap();
        }
        // Every call runs on the same two workers.
        let seen = seen.into_inner().unwrap();
        assert!(!seen.is_empty() && seen.len() <= 2, "{} threads", seen.len());
        assert!(!seen.contains(&std::thread::current().id()));

        let input = i16_bytes(&sine(3 * 2000, 2, 48000.0, 440.0));
        let out = run_all(&mut engine, &input, 3);
        assert_eq!(out.len(), 2000 * 4);
    }

    #[test]
    fn test_passthrough_converts_format() {
        let spec = Config::new(16000.0, 16000.0, 1)
            .with_formats(SampleFormat::Int16, SampleFormat::Float32)
            .engine_spec()
            .unwrap();
        let mut engine = RubatoEngine::new(&spec).unwrap();

        let input = i16_bytes(&[16384, -16384, 0]);
        let mut output = vec![0u8; 12];
        let p = engine.process(&input, &mut output).unwrap();
        assert_eq!(p, Progress { frames_consumed: 3, frames_produced: 3 });
        assert_eq!(f32::from_le_bytes(output[0..4].try_into().unwrap()), 0.5);
        assert_eq!(f32::from_le_bytes(output[4..8].try_into().unwrap()), -0.5);

        let mut rest = vec![0u8; 64];
        assert_eq!(engine.flush(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_downsample_total_frames() {
        for quality in Quality::ALL {
            let spec = Config::new(16000.0, 8000.0, 2)
                .with_quality(quality)
                .engine_spec()
                .unwrap();
            let mut engine = RubatoEngine::new(&spec).unwrap();
            let input = i16_bytes(&sine(16000, 2, 16000.0, 440.0));
            let out = run_all(&mut engine, &input, 1000);
            assert_eq!(out.len(), 8000 * 4, "quality {quality}");
        }
    }

    #[test]
    fn test_upsample_odd_ratio_total_frames() {
        let mut engine = RubatoEngine::new(&spec(44100.0, 48000.0, 1, 1)).unwrap();
        let input = i16_bytes(&sine(4410, 1, 44100.0, 1000.0));
        let out = run_all(&mut engine, &input, 333);
        assert_eq!(out.len() / 2, 4800);
    }

    #[test]
    fn test_sine_level_preserved() {
        let mut engine = RubatoEngine::new(&spec(48000.0, 16000.0, 1, 1)).unwrap();
        let input = i16_bytes(&sine(48000, 1, 48000.0, 1000.0));
        let out = run_all(&mut engine, &input, 4800);

        let samples: Vec<f64> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f64 / 32768.0)
            .collect();
        let body = &samples[1000..samples.len() - 1000];
        let rms = (body.iter().map(|s| s * s).sum::<f64>() / body.len() as f64).sqrt();
        let expected = 0.5 / 2f64.sqrt();
        assert!((rms - expected).abs() < 0.02, "rms {rms}, expected {expected}");
    }

    #[test]
    fn test_parallel_lanes_match_single_lane() {
        let input = i16_bytes(&sine(8000, 2, 48000.0, 3000.0));

        let mut single = RubatoEngine::new(&spec(48000.0, 44100.0, 2, 1)).unwrap();
        let mut parallel = RubatoEngine::new(&spec(48000.0, 44100.0, 2, 2)).unwrap();
        assert_eq!(parallel.lanes(), 2);

        let a = run_all(&mut single, &input, 2000);
        let b = run_all(&mut parallel, &input, 2000);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.chunks_exact(2).zip(b.chunks_exact(2)) {
            let x = i16::from_le_bytes([x[0], x[1]]);
            let y = i16::from_le_bytes([y[0], y[1]]);
            assert!((x - y).abs() <= 1);
        }
    }

    #[test]
    fn test_process_after_flush_requires_clear() {
        let mut engine = RubatoEngine::new(&spec(16000.0, 8000.0, 1, 1)).unwrap();
        let input = i16_bytes(&[0; 100]);
        let mut out = vec![0u8; 100];
        engine.process(&input, &mut out).unwrap();
        let mut tail = vec![0u8; 1024];
        assert_eq!(engine.flush(&mut tail).unwrap(), 50);
        assert!(engine.process(&input, &mut out).is_err());

        engine.clear().unwrap();
        engine.process(&input, &mut out).unwrap();
        assert_eq!(engine.flush(&mut tail).unwrap(), 50);
    }

    #[test]
    fn test_flush_respects_capacity() {
        let mut engine = RubatoEngine::new(&spec(8000.0, 16000.0, 1, 1)).unwrap();
        let input = i16_bytes(&[0; 500]);
        let mut out = vec![0u8; 2000];
        let p = engine.process(&input, &mut out).unwrap();
        assert_eq!(p.frames_consumed, 500);

        let mut total = p.frames_produced;
        let mut small = vec![0u8; 2 * 100];
        loop {
            let n = engine.flush(&mut small).unwrap();
            total += n;
            if n < 100 {
                break;
            }
        }
        assert_eq!(total, 1000);
    }
}
