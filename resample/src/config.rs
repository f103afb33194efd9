//! Stream configuration.

use std::num::NonZeroUsize;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, Result};
use crate::format::{Quality, SampleFormat};

/// Configuration of a resampling stream.
///
/// Can be deserialized from YAML or JSON:
///
/// ```yaml
/// input_rate: 44100
/// output_rate: 16000
/// channels: 2
/// input_format: i16
/// output_format: f32
/// quality: high
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Input sample rate in Hz.
    pub input_rate: f64,
    /// Output sample rate in Hz.
    pub output_rate: f64,
    /// Number of interleaved channels.
    pub channels: usize,
    /// Input sample format.
    #[serde(default = "default_format")]
    pub input_format: SampleFormat,
    /// Output sample format.
    #[serde(default = "default_format")]
    pub output_format: SampleFormat,
    /// Resampling quality.
    #[serde(default)]
    pub quality: Quality,
    /// Engine worker threads. `None` uses the number of available cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

fn default_format() -> SampleFormat {
    SampleFormat::Int16
}

impl Config {
    /// Creates a 16-bit to 16-bit configuration with high quality.
    pub fn new(input_rate: f64, output_rate: f64, channels: usize) -> Self {
        Self {
            input_rate,
            output_rate,
            channels,
            input_format: SampleFormat::Int16,
            output_format: SampleFormat::Int16,
            quality: Quality::High,
            threads: None,
        }
    }

    /// Builds a configuration from raw numeric identifiers.
    ///
    /// Checks are applied in order: rates, channels, quality, input format,
    /// output format. Each failure is a distinct error.
    pub fn from_raw(
        input_rate: f64,
        output_rate: f64,
        channels: usize,
        input_format: u32,
        output_format: u32,
        quality: u32,
    ) -> Result<Self> {
        check_rates(input_rate, output_rate)?;
        check_channels(channels)?;
        let quality = Quality::from_level(quality).ok_or(ResampleError::InvalidQuality(quality))?;
        let input_format = SampleFormat::from_id(input_format)
            .ok_or_else(|| ResampleError::InvalidInputFormat(input_format.to_string()))?;
        let output_format = SampleFormat::from_id(output_format)
            .ok_or_else(|| ResampleError::InvalidOutputFormat(output_format.to_string()))?;

        Ok(Self {
            input_rate,
            output_rate,
            channels,
            input_format,
            output_format,
            quality,
            threads: None,
        })
    }

    /// Sets the input and output sample formats.
    pub fn with_formats(mut self, input: SampleFormat, output: SampleFormat) -> Self {
        self.input_format = input;
        self.output_format = output;
        self
    }

    /// Sets the quality.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the number of engine worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        check_rates(self.input_rate, self.output_rate)?;
        check_channels(self.channels)?;
        if self.threads == Some(0) {
            return Err(ResampleError::InvalidThreads);
        }
        Ok(())
    }

    /// Returns `output_rate / input_rate`.
    pub fn ratio(&self) -> f64 {
        self.output_rate / self.input_rate
    }

    /// Returns the size of one input frame in bytes.
    pub fn input_frame_bytes(&self) -> usize {
        self.channels * self.input_format.byte_width()
    }

    /// Returns the size of one output frame in bytes.
    pub fn output_frame_bytes(&self) -> usize {
        self.channels * self.output_format.byte_width()
    }

    /// Validates the configuration and resolves it into an engine spec.
    pub fn engine_spec(&self) -> Result<EngineSpec> {
        self.validate()?;
        let threads = match self.threads {
            Some(n) => n,
            None => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        };
        Ok(EngineSpec {
            input_rate: self.input_rate,
            output_rate: self.output_rate,
            channels: self.channels,
            input_format: self.input_format,
            output_format: self.output_format,
            quality: self.quality,
            threads,
        })
    }
}

fn check_rates(input: f64, output: f64) -> Result<()> {
    let valid = |rate: f64| rate.is_finite() && rate > 0.0;
    if !valid(input) || !valid(output) {
        return Err(ResampleError::InvalidRate { input, output });
    }
    Ok(())
}

fn check_channels(channels: usize) -> Result<()> {
    if channels == 0 {
        return Err(ResampleError::InvalidChannels(channels));
    }
    Ok(())
}

/// Validated parameters handed to an engine constructor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSpec {
    pub input_rate: f64,
    pub output_rate: f64,
    pub channels: usize,
    pub input_format: SampleFormat,
    pub output_format: SampleFormat,
    pub quality: Quality,
    /// Worker threads the engine may use, at least 1.
    pub threads: usize,
}

impl EngineSpec {
    /// Returns `output_rate / input_rate`.
    pub fn ratio(&self) -> f64 {
        self.output_rate / self.input_rate
    }

    /// Returns the size of one input frame in bytes.
    pub fn input_frame_bytes(&self) -> usize {
        self.channels * self.input_format.byte_width()
    }

    /// Returns the size of one output frame in bytes.
    pub fn output_frame_bytes(&self) -> usize {
        self.channels * self.output_format.byte_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_frame_bytes() {
        let cfg = Config::new(16000.0, 8000.0, 2)
            .with_formats(SampleFormat::Int16, SampleFormat::Float64);
        assert_eq!(cfg.input_frame_bytes(), 4);
        assert_eq!(cfg.output_frame_bytes(), 16);
        assert_eq!(cfg.ratio(), 0.5);
    }

    #[test]
    fn test_validate_rates() {
        for (input, output) in [(0.0, 8000.0), (8000.0, 0.0), (-1.0, 8000.0), (f64::NAN, 8000.0)] {
            let err = Config::new(input, output, 1).validate().unwrap_err();
            assert!(matches!(err, ResampleError::InvalidRate { .. }), "{err}");
        }
    }

    #[test]
    fn test_validate_channels() {
        let err = Config::new(8000.0, 16000.0, 0).validate().unwrap_err();
        assert!(matches!(err, ResampleError::InvalidChannels(0)));
    }

    #[test]
    fn test_validate_threads() {
        let err = Config::new(8000.0, 16000.0, 1)
            .with_threads(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ResampleError::InvalidThreads));
    }

    #[test]
    fn test_from_raw_order() {
        // Rates are checked before everything else.
        let err = Config::from_raw(0.0, 8000.0, 0, 9, 9, 9).unwrap_err();
        assert!(matches!(err, ResampleError::InvalidRate { .. }));

        let err = Config::from_raw(16000.0, 8000.0, 0, 9, 9, 9).unwrap_err();
        assert!(matches!(err, ResampleError::InvalidChannels(0)));

        let err = Config::from_raw(16000.0, 8000.0, 1, 9, 9, 5).unwrap_err();
        assert!(matches!(err, ResampleError::InvalidQuality(5)));

        let err = Config::from_raw(16000.0, 8000.0, 1, 9, 9, 4).unwrap_err();
        assert!(matches!(err, ResampleError::InvalidInputFormat(_)));

        let err = Config::from_raw(16000.0, 8000.0, 1, 3, 9, 4).unwrap_err();
        assert!(matches!(err, ResampleError::InvalidOutputFormat(_)));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_from_raw_ok() {
        let cfg = Config::from_raw(44100.0, 48000.0, 2, 3, 0, 6).unwrap();
        assert_eq!(cfg.input_format, SampleFormat::Int16);
        assert_eq!(cfg.output_format, SampleFormat::Float32);
        assert_eq!(cfg.quality, Quality::VeryHigh);
    }

    #[test]
    fn test_engine_spec_threads() {
        let spec = Config::new(8000.0, 16000.0, 1).engine_spec().unwrap();
        assert!(spec.threads >= 1);

        let spec = Config::new(8000.0, 16000.0, 1)
            .with_threads(3)
            .engine_spec()
            .unwrap();
        assert_eq!(spec.threads, 3);
        assert_eq!(spec.ratio(), 2.0);
    }

    #[test]
    fn test_deserialize() {
        let cfg: Config = serde_json::from_str(
            r#"{"input_rate": 44100, "output_rate": 16000, "channels": 1, "output_format": "f32"}"#,
        )
        .unwrap();
        assert_eq!(cfg.input_format, SampleFormat::Int16);
        assert_eq!(cfg.output_format, SampleFormat::Float32);
        assert_eq!(cfg.quality, Quality::High);
        assert_eq!(cfg.threads, None);
    }
}
