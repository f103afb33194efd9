//! Error types for resampling.

use std::io;

use thiserror::Error;

/// Error reported by a resampling engine.
///
/// The message is taken verbatim from the engine (libsoxr error string or
/// rubato error text).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    /// Creates an engine error from a message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the engine message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<rubato::ResamplerConstructionError> for EngineError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        Self(format!("rubato: {}", e))
    }
}

impl From<rubato::ResampleError> for EngineError {
    fn from(e: rubato::ResampleError) -> Self {
        Self(format!("rubato: {}", e))
    }
}

impl From<rayon::ThreadPoolBuildError> for EngineError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self(format!("worker pool: {}", e))
    }
}

/// Coarse classification of a [`ResampleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration, raised at construction.
    Config,
    /// Operation on a closed stream.
    Misuse,
    /// Input chunk that cannot be processed as given.
    InputShape,
    /// Failure inside the resampling engine.
    Engine,
    /// Failure writing to the destination.
    Io,
}

/// Errors returned by the stream resampler.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("resample: invalid input or output sampling rates ({input} -> {output})")]
    InvalidRate { input: f64, output: f64 },

    #[error("resample: invalid channels number {0}")]
    InvalidChannels(usize),

    #[error("resample: invalid quality setting {0}")]
    InvalidQuality(u32),

    #[error("resample: invalid input format {0:?}")]
    InvalidInputFormat(String),

    #[error("resample: invalid output format {0:?}")]
    InvalidOutputFormat(String),

    #[error("resample: invalid worker thread count 0")]
    InvalidThreads,

    #[error("resample: resampler is closed")]
    Closed,

    #[error("resample: incomplete input frame data ({len} bytes, frame is {frame_bytes} bytes)")]
    IncompleteFrame { len: usize, frame_bytes: usize },

    #[error("resample: not enough input to generate output ({frames} input frames)")]
    InsufficientInput { frames: usize },

    #[error("resample: engine {op} failed: {source}")]
    Engine {
        op: &'static str,
        #[source]
        source: EngineError,
    },

    #[error("resample: destination write failed: {0}")]
    Io(#[from] io::Error),
}

impl ResampleError {
    pub(crate) fn engine(op: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |source| Self::Engine { op, source }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRate { .. }
            | Self::InvalidChannels(_)
            | Self::InvalidQuality(_)
            | Self::InvalidInputFormat(_)
            | Self::InvalidOutputFormat(_)
            | Self::InvalidThreads => ErrorKind::Config,
            Self::Closed => ErrorKind::Misuse,
            Self::IncompleteFrame { .. } | Self::InsufficientInput { .. } => ErrorKind::InputShape,
            Self::Engine { .. } => ErrorKind::Engine,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<ResampleError> for io::Error {
    fn from(e: ResampleError) -> Self {
        let kind = match e.kind() {
            ErrorKind::Config | ErrorKind::InputShape => io::ErrorKind::InvalidInput,
            ErrorKind::Misuse => io::ErrorKind::BrokenPipe,
            ErrorKind::Engine => io::ErrorKind::Other,
            ErrorKind::Io => match e {
                ResampleError::Io(inner) => return inner,
                _ => io::ErrorKind::Other,
            },
        };
        io::Error::new(kind, e)
    }
}

/// Result alias for resampling operations.
pub type Result<T> = std::result::Result<T, ResampleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResampleError::IncompleteFrame { len: 3, frame_bytes: 4 };
        assert!(err.to_string().contains("incomplete input frame"));

        let err = ResampleError::Engine {
            op: "process",
            source: EngineError::new("boom"),
        };
        assert_eq!(err.to_string(), "resample: engine process failed: boom");

        assert!(ResampleError::Closed.to_string().contains("closed"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(ResampleError::InvalidChannels(0).kind(), ErrorKind::Config);
        assert_eq!(ResampleError::InvalidThreads.kind(), ErrorKind::Config);
        assert_eq!(ResampleError::Closed.kind(), ErrorKind::Misuse);
        assert_eq!(
            ResampleError::InsufficientInput { frames: 1 }.kind(),
            ErrorKind::InputShape
        );
        assert_eq!(
            ResampleError::Io(io::Error::other("x")).kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = ResampleError::Closed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let err: io::Error = ResampleError::IncompleteFrame { len: 1, frame_bytes: 2 }.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let inner = io::Error::new(io::ErrorKind::WriteZero, "sink full");
        let err: io::Error = ResampleError::Io(inner).into();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(err.to_string(), "sink full");
    }
}
