//! Settings loading: config file first, then command line overrides.

use std::fs;
use std::io;
use std::path::Path;

use giztoy_resample::{Config, Quality, ResampleError, SampleFormat};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::Cli;

pub const DEFAULT_INPUT_RATE: f64 = 44100.0;
pub const DEFAULT_CHANNELS: usize = 2;

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read file: {0}")]
    ReadFile(#[from] io::Error),
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("failed to parse file (tried YAML and JSON)")]
    ParseFailed,
    #[error("output rate is required (--out-rate or output_rate in the config file)")]
    MissingOutputRate,
    #[error("unknown quality {0:?}")]
    UnknownQuality(String),
    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// Stream settings as read from a config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub input_rate: Option<f64>,
    pub output_rate: Option<f64>,
    pub channels: Option<usize>,
    pub input_format: Option<SampleFormat>,
    pub output_format: Option<SampleFormat>,
    pub quality: Option<Quality>,
    pub threads: Option<usize>,
}

/// Loads a YAML or JSON file into the provided type.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, SettingsError> {
    let data = fs::read(path.as_ref())?;
    parse_file(&data, path.as_ref())
}

/// Parses file data based on its extension, falling back to content sniffing.
pub fn parse_file<T: DeserializeOwned>(
    data: &[u8],
    path: impl AsRef<Path>,
) -> Result<T, SettingsError> {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_slice(data)?),
        Some("json") => Ok(serde_json::from_slice(data)?),
        _ => {
            if let Ok(v) = serde_yaml::from_slice(data) {
                return Ok(v);
            }
            if let Ok(v) = serde_json::from_slice(data) {
                return Ok(v);
            }
            Err(SettingsError::ParseFailed)
        }
    }
}

/// Parses a quality given either by name or by numeric level.
pub fn parse_quality(s: &str) -> Result<Quality, SettingsError> {
    if let Ok(level) = s.parse::<u32>() {
        return Quality::from_level(level).ok_or(SettingsError::Resample(
            ResampleError::InvalidQuality(level),
        ));
    }
    s.parse()
        .map_err(|_| SettingsError::UnknownQuality(s.to_string()))
}

fn parse_input_format(s: &str) -> Result<SampleFormat, SettingsError> {
    s.parse()
        .map_err(|_| ResampleError::InvalidInputFormat(s.to_string()).into())
}

fn parse_output_format(s: &str) -> Result<SampleFormat, SettingsError> {
    s.parse()
        .map_err(|_| ResampleError::InvalidOutputFormat(s.to_string()).into())
}

/// Builds the stream configuration. Flags win over the config file, which
/// wins over the defaults. The result is validated.
pub fn resolve(cli: &Cli) -> Result<Config, SettingsError> {
    let file: FileSettings = match &cli.config {
        Some(path) => load_file(path)?,
        None => FileSettings::default(),
    };
    merge(cli, file)
}

fn merge(cli: &Cli, file: FileSettings) -> Result<Config, SettingsError> {
    let input_rate = cli
        .in_rate
        .or(file.input_rate)
        .unwrap_or(DEFAULT_INPUT_RATE);
    let output_rate = cli
        .out_rate
        .or(file.output_rate)
        .ok_or(SettingsError::MissingOutputRate)?;
    let channels = cli.channels.or(file.channels).unwrap_or(DEFAULT_CHANNELS);

    let input_format = match &cli.in_format {
        Some(s) => parse_input_format(s)?,
        None => file.input_format.unwrap_or(SampleFormat::Int16),
    };
    let output_format = match &cli.out_format {
        Some(s) => parse_output_format(s)?,
        None => file.output_format.unwrap_or(SampleFormat::Int16),
    };
    let quality = match &cli.quality {
        Some(s) => parse_quality(s)?,
        None => file.quality.unwrap_or_default(),
    };

    let mut config = Config::new(input_rate, output_rate, channels)
        .with_formats(input_format, output_format)
        .with_quality(quality);
    config.threads = cli.threads.or(file.threads);
    config.validate()?;
    Ok(config)
}
