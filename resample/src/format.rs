//! Sample formats and quality levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// PCM sample encoding of one channel value.
///
/// Samples are interleaved and little-endian. The raw identifiers match the
/// libsoxr interleaved datatypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    /// 32-bit floating point.
    #[serde(rename = "f32")]
    Float32,
    /// 64-bit floating point.
    #[serde(rename = "f64")]
    Float64,
    /// 32-bit signed linear.
    #[serde(rename = "i32")]
    Int32,
    /// 16-bit signed linear.
    #[serde(rename = "i16")]
    Int16,
}

impl SampleFormat {
    /// Returns the width of one sample in bytes.
    pub const fn byte_width(self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
            Self::Int32 => 4,
            Self::Int16 => 2,
        }
    }

    /// Returns the raw format identifier.
    pub const fn id(self) -> u32 {
        match self {
            Self::Float32 => 0,
            Self::Float64 => 1,
            Self::Int32 => 2,
            Self::Int16 => 3,
        }
    }

    /// Looks up a format by its raw identifier.
    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Float32),
            1 => Some(Self::Float64),
            2 => Some(Self::Int32),
            3 => Some(Self::Int16),
            _ => None,
        }
    }

    /// Returns the short name (`f32`, `f64`, `i32`, `i16`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Int32 => "i32",
            Self::Int16 => "i16",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a format or quality name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name {:?}", self.0)
    }
}

impl std::error::Error for UnknownName {}

impl FromStr for SampleFormat {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" => Ok(Self::Float32),
            "f64" => Ok(Self::Float64),
            "i32" => Ok(Self::Int32),
            "i16" => Ok(Self::Int16),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}

/// Resampling quality.
///
/// Only the engine's filter precision and latency depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Cubic interpolation.
    Quick,
    /// 16-bit quality with a large rolloff.
    Low,
    /// 16-bit quality with a medium rolloff.
    Medium,
    /// High quality.
    #[default]
    High,
    /// Very high quality.
    VeryHigh,
}

impl Quality {
    /// All quality levels, lowest first.
    pub const ALL: [Quality; 5] = [
        Quality::Quick,
        Quality::Low,
        Quality::Medium,
        Quality::High,
        Quality::VeryHigh,
    ];

    /// Returns the numeric level (libsoxr recipe).
    pub const fn level(self) -> u32 {
        match self {
            Self::Quick => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 4,
            Self::VeryHigh => 6,
        }
    }

    /// Looks up a quality by its numeric level.
    pub const fn from_level(level: u32) -> Option<Self> {
        match level {
            0 => Some(Self::Quick),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            4 => Some(Self::High),
            6 => Some(Self::VeryHigh),
            _ => None,
        }
    }

    /// Returns the short name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quality {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "quick" | "qq" => Ok(Self::Quick),
            "low" | "lq" => Ok(Self::Low),
            "medium" | "mq" => Ok(Self::Medium),
            "high" | "hq" => Ok(Self::High),
            "very_high" | "veryhigh" | "vhq" => Ok(Self::VeryHigh),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}
