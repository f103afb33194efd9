//! Streaming PCM sample rate conversion.
//!
//! This crate resamples raw interleaved PCM audio as it is written:
//!
//! - [`StreamResampler`]: an `io::Write` that resamples into a destination writer
//! - [`Engine`]: the rate conversion backend ([`RubatoEngine`] by default,
//!   `SoxrEngine` with the `soxr` feature)
//! - [`FrameReader`]: frame-aligned reads for feeding the resampler
//! - [`codec`]: conversion between sample formats
//!
//! # Example
//!
//! ```rust
//! use giztoy_resample::{Config, FrameReader, SampleFormat, StreamResampler};
//! use std::io::{Cursor, Read};
//!
//! // One second of stereo 16-bit silence at 16kHz.
//! let input = Cursor::new(vec![0u8; 64000]);
//!
//! let config = Config::new(16000.0, 8000.0, 2)
//!     .with_formats(SampleFormat::Int16, SampleFormat::Float32);
//! let mut output = Vec::new();
//! let mut resampler = StreamResampler::new(&mut output, config.clone())?;
//!
//! let mut reader = FrameReader::new(input, config.input_frame_bytes());
//! let mut buf = vec![0u8; 4096];
//! loop {
//!     let n = reader.fill(&mut buf)?;
//!     if n == 0 {
//!         break;
//!     }
//!     resampler.resample(&buf[..n])?;
//! }
//! // Close before using the output: it flushes the engine.
//! resampler.close()?;
//! drop(resampler);
//!
//! assert_eq!(output.len(), 8000 * config.output_frame_bytes());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
mod reader;
mod stream;

pub use config::{Config, EngineSpec};
pub use engine::{Engine, Progress, RubatoEngine};
#[cfg(feature = "soxr")]
pub use engine::SoxrEngine;
pub use error::{EngineError, ErrorKind, ResampleError, Result};
pub use format::{Quality, SampleFormat};
pub use reader::FrameReader;
pub use stream::{FLUSH_FRAMES, Stats, StreamResampler};
