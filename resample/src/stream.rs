//! Streaming resampler.

use std::io::{self, Write};
use std::mem::ManuallyDrop;
use std::ptr;

use tracing::{debug, trace, warn};

use crate::config::{Config, EngineSpec};
use crate::engine::{Engine, RubatoEngine};
use crate::error::{EngineError, ResampleError, Result};

/// Output frames requested per engine flush call.
pub const FLUSH_FRAMES: usize = 4096 * 16;

/// Running totals of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Input frames accepted.
    pub frames_in: u64,
    /// Output frames written to the destination.
    pub frames_out: u64,
    /// Output bytes written to the destination.
    pub bytes_out: u64,
}

/// Resamples raw interleaved PCM written to it into a destination writer.
///
/// `StreamResampler` implements [`io::Write`]: every write must hold whole
/// frames, and resampled bytes are written to the destination in submission
/// order. The engine buffers internally, so the output is only complete after
/// [`close`](Self::close), which must be called before the destination is
/// read or closed.
///
/// The destination is never closed by the resampler. To keep ownership, pass
/// a mutable reference.
///
/// # Example
///
/// ```
/// use giztoy_resample::{Config, StreamResampler};
/// use std::io::Write;
///
/// let mut out = Vec::new();
/// let mut r = StreamResampler::new(&mut out, Config::new(16000.0, 8000.0, 1))?;
/// r.write_all(&[0u8; 3200])?;
/// r.close()?;
/// drop(r);
/// assert_eq!(out.len(), 1600);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct StreamResampler<W: Write, E: Engine = RubatoEngine> {
    config: Config,
    input_frame_bytes: usize,
    output_frame_bytes: usize,
    destination: W,
    /// None once closed.
    engine: Option<E>,
    buf: Vec<u8>,
    stats: Stats,
}

impl<W: Write> StreamResampler<W> {
    /// Creates a resampler using the default engine.
    pub fn new(destination: W, config: Config) -> Result<Self> {
        Self::with_engine(destination, config, RubatoEngine::new)
    }
}

impl<W: Write, E: Engine> StreamResampler<W, E> {
    /// Creates a resampler with an engine built by `create`.
    ///
    /// The configuration is validated first; `create` is not called when it
    /// is invalid. Engine errors are returned wrapped.
    pub fn with_engine<F>(destination: W, config: Config, create: F) -> Result<Self>
    where
        F: FnOnce(&EngineSpec) -> std::result::Result<E, EngineError>,
    {
        let spec = config.engine_spec()?;
        let engine = create(&spec).map_err(ResampleError::engine("create"))?;

        debug!(
            input_rate = config.input_rate,
            output_rate = config.output_rate,
            channels = config.channels,
            input_format = %config.input_format,
            output_format = %config.output_format,
            quality = %config.quality,
            threads = spec.threads,
            "resampler created"
        );

        Ok(Self {
            input_frame_bytes: config.input_frame_bytes(),
            output_frame_bytes: config.output_frame_bytes(),
            config,
            destination,
            engine: Some(engine),
            buf: Vec::new(),
            stats: Stats::default(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Returns running totals.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Gets a reference to the destination.
    pub fn get_ref(&self) -> &W {
        &self.destination
    }

    /// Gets a mutable reference to the destination.
    ///
    /// Writing to it directly interleaves with resampled output.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.destination
    }

    /// Consumes the resampler and returns the destination.
    ///
    /// Call [`close`](Self::close) first: an unclosed engine is released
    /// without flushing and its buffered output is discarded.
    pub fn into_inner(self) -> W {
        let mut this = ManuallyDrop::new(self);
        this.release();
        // SAFETY: `this` is never dropped, and every field is either read out
        // or dropped in place exactly once below.
        unsafe {
            ptr::drop_in_place(&mut this.engine);
            ptr::drop_in_place(&mut this.buf);
            ptr::drop_in_place(&mut this.config);
            ptr::read(&this.destination)
        }
    }

    /// Resamples `input` and writes the result to the destination.
    ///
    /// `input` must hold whole frames. Returns `input.len()` on success; on
    /// error nothing is reported as consumed, although the engine may already
    /// have taken the input if the destination write failed.
    ///
    /// The output buffer offered to the engine holds at least
    /// `floor(frames × ratio)` frames, raised to whatever the stream is
    /// behind its `round(total_in × ratio)` target, so output held back by
    /// the engine on small writes is released on later writes.
    pub fn resample(&mut self, input: &[u8]) -> Result<usize> {
        let engine = self.engine.as_mut().ok_or(ResampleError::Closed)?;
        if input.is_empty() {
            return Ok(0);
        }

        if input.len() % self.input_frame_bytes != 0 {
            return Err(ResampleError::IncompleteFrame {
                len: input.len(),
                frame_bytes: self.input_frame_bytes,
            });
        }
        let frames_in = input.len() / self.input_frame_bytes;
        let frames_out = (frames_in as f64 * self.config.ratio()) as usize;
        if frames_out == 0 {
            return Err(ResampleError::InsufficientInput { frames: frames_in });
        }

        let due = ((self.stats.frames_in + frames_in as u64) as f64 * self.config.ratio()).round()
            as u64;
        let capacity = frames_out.max(due.saturating_sub(self.stats.frames_out) as usize);

        self.buf.clear();
        self.buf.resize(capacity * self.output_frame_bytes, 0);
        let progress = engine
            .process(input, &mut self.buf)
            .map_err(ResampleError::engine("process"))?;

        if progress.frames_consumed < frames_in {
            warn!(
                offered = frames_in,
                consumed = progress.frames_consumed,
                "engine consumed a partial chunk"
            );
        }
        trace!(
            frames_in,
            capacity,
            produced = progress.frames_produced,
            "resampled chunk"
        );

        let n = progress.frames_produced * self.output_frame_bytes;
        self.destination.write_all(&self.buf[..n])?;

        self.stats.frames_in += frames_in as u64;
        self.stats.frames_out += progress.frames_produced as u64;
        self.stats.bytes_out += n as u64;
        Ok(input.len())
    }

    /// Drains the engine into the destination.
    fn drain(
        engine: &mut E,
        buf: &mut Vec<u8>,
        destination: &mut W,
        output_frame_bytes: usize,
        stats: &mut Stats,
    ) -> Result<()> {
        buf.clear();
        buf.resize(FLUSH_FRAMES * output_frame_bytes, 0);
        loop {
            let frames = engine.flush(buf).map_err(ResampleError::engine("flush"))?;
            let n = frames * output_frame_bytes;
            destination.write_all(&buf[..n])?;
            stats.frames_out += frames as u64;
            stats.bytes_out += n as u64;
            if frames < FLUSH_FRAMES {
                return Ok(());
            }
        }
    }

    /// Flushes pending output, releases the engine and marks the stream
    /// closed.
    ///
    /// The engine is released even when flushing fails; the flush error is
    /// returned. Closing an already closed stream fails with
    /// [`ResampleError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let mut engine = self.engine.take().ok_or(ResampleError::Closed)?;
        let result = Self::drain(
            &mut engine,
            &mut self.buf,
            &mut self.destination,
            self.output_frame_bytes,
            &mut self.stats,
        );
        drop(engine);
        self.buf = Vec::new();

        debug!(
            frames_in = self.stats.frames_in,
            frames_out = self.stats.frames_out,
            ok = result.is_ok(),
            "resampler closed"
        );
        result
    }

    /// Flushes pending output into the current destination, clears the
    /// engine and switches to `destination`.
    ///
    /// The switch happens even when flushing fails; the flush error is
    /// returned. The previous destination is dropped.
    pub fn reset(&mut self, destination: W) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(ResampleError::Closed)?;
        let flushed = Self::drain(
            engine,
            &mut self.buf,
            &mut self.destination,
            self.output_frame_bytes,
            &mut self.stats,
        );
        let cleared = engine.clear().map_err(ResampleError::engine("clear"));
        self.destination = destination;

        debug!(
            frames_in = self.stats.frames_in,
            frames_out = self.stats.frames_out,
            "resampler reset"
        );
        self.stats = Stats::default();
        flushed.and(cleared)
    }

    /// Releases the engine without flushing.
    fn release(&mut self) {
        if self.engine.take().is_some() {
            warn!(
                frames_in = self.stats.frames_in,
                "resampler dropped without close, buffered output discarded"
            );
        }
    }
}

impl<W: Write, E: Engine> Write for StreamResampler<W, E> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.resample(buf)?)
    }

    /// Flushes the destination. Engine buffers are only drained by
    /// [`StreamResampler::close`] and [`StreamResampler::reset`].
    fn flush(&mut self) -> io::Result<()> {
        if self.is_closed() {
            return Err(ResampleError::Closed.into());
        }
        self.destination.flush()
    }
}

impl<W: Write, E: Engine> Drop for StreamResampler<W, E> {
    fn drop(&mut self) {
        self.release();
    }
}
