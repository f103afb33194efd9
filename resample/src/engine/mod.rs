//! Resampling engines.
//!
//! An [`Engine`] performs the actual rate conversion arithmetic. The stream
//! resampler only talks to this trait, so engines can be swapped (or faked in
//! tests) without touching the streaming protocol.
//!
//! - [`RubatoEngine`]: pure Rust, the default.
//! - `SoxrEngine`: libsoxr binding, behind the `soxr` feature.
//!
//! Engines are created by their constructor from an [`EngineSpec`] and
//! destroyed by `Drop`.
//!
//! [`EngineSpec`]: crate::EngineSpec

mod rubato_impl;

#[cfg(feature = "soxr")]
mod ffi;
#[cfg(feature = "soxr")]
mod soxr;

pub use rubato_impl::RubatoEngine;

#[cfg(feature = "soxr")]
pub use self::soxr::SoxrEngine;

use crate::error::EngineError;

/// Frames handled by one [`Engine::process`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Input frames taken from the input buffer.
    pub frames_consumed: usize,
    /// Output frames written to the start of the output buffer.
    pub frames_produced: usize,
}

/// A stateful sample rate converter working on interleaved PCM bytes.
///
/// Buffers always hold whole frames in the formats the engine was created
/// with. Engines may buffer internally: a call can produce fewer frames than
/// the output buffer holds, and the remainder is emitted by later calls or
/// by [`Engine::flush`].
pub trait Engine {
    /// Resamples `input` into `output`.
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress, EngineError>;

    /// Signals end of input and writes pending output into `output`.
    ///
    /// Returns the number of frames written. Call repeatedly until it returns
    /// fewer frames than `output` holds to drain everything.
    fn flush(&mut self, output: &mut [u8]) -> Result<usize, EngineError>;

    /// Discards all internal state so a new stream can start.
    fn clear(&mut self) -> Result<(), EngineError>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress, EngineError> {
        (**self).process(input, output)
    }

    fn flush(&mut self, output: &mut [u8]) -> Result<usize, EngineError> {
        (**self).flush(output)
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        (**self).clear()
    }
}
