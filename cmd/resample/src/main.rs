//! resample - convert raw PCM audio between sample rates and formats.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use giztoy_resample::{Config, FrameReader, ResampleError, Stats, StreamResampler};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod output;
mod settings;
mod wav;

use output::OutputFile;

/// Approximate read size; rounded down to whole frames.
const CHUNK_BYTES: usize = 64 * 1024;

/// resample - convert raw interleaved PCM between sample rates and formats.
///
/// Input and output are headerless little-endian PCM. For `.wav` inputs the
/// 44-byte header is skipped; the declared settings must match the data.
///
/// Settings may be loaded from a YAML or JSON file with --config; flags
/// given on the command line take precedence.
#[derive(Parser)]
#[command(name = "resample")]
#[command(about = "Raw PCM sample rate converter")]
#[command(version)]
pub struct Cli {
    /// Input sample format: f32, f64, i32 or i16 [default: i16]
    #[arg(long = "in-format", visible_alias = "if", value_name = "FORMAT")]
    pub in_format: Option<String>,

    /// Output sample format: f32, f64, i32 or i16 [default: i16]
    #[arg(long = "out-format", visible_aliases = ["of", "iof"], value_name = "FORMAT")]
    pub out_format: Option<String>,

    /// Number of interleaved channels [default: 2]
    #[arg(short = 'c', long, visible_alias = "ch", value_name = "N")]
    pub channels: Option<usize>,

    /// Input sample rate in Hz [default: 44100]
    #[arg(long = "in-rate", visible_alias = "ir", value_name = "HZ")]
    pub in_rate: Option<f64>,

    /// Output sample rate in Hz (required unless set in the config file)
    #[arg(long = "out-rate", visible_alias = "or", value_name = "HZ")]
    pub out_rate: Option<f64>,

    /// Quality: quick, low, medium, high, very_high or a level 0/1/2/4/6 [default: high]
    #[arg(short = 'q', long, value_name = "LEVEL")]
    pub quality: Option<String>,

    /// Engine worker threads [default: available cores]
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Settings file (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Input file
    pub input: PathBuf,

    /// Output file
    pub output: PathBuf,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(stats) => {
            info!(
                frames_in = stats.frames_in,
                frames_out = stats.frames_out,
                bytes_out = stats.bytes_out,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Stats> {
    let config = settings::resolve(cli).context("invalid settings")?;
    debug!(?config, "settings resolved");

    let mut input = File::open(&cli.input)
        .with_context(|| format!("failed to open input {}", cli.input.display()))?;
    if wav::is_wav(&cli.input) {
        wav::skip_header(&mut input).context("failed to skip WAV header")?;
        debug!(bytes = wav::WAV_HEADER_LEN, "skipped WAV header");
    }

    let mut output = OutputFile::create(&cli.output)
        .with_context(|| format!("failed to create output {}", cli.output.display()))?;

    let stats = convert(BufReader::new(input), &mut output, config)?;

    output
        .commit()
        .with_context(|| format!("failed to write output {}", output.path().display()))?;
    Ok(stats)
}

/// Streams `input` through a resampler into `output`.
fn convert<R: std::io::Read>(input: R, output: &mut OutputFile, config: Config) -> Result<Stats> {
    let frame_bytes = config.input_frame_bytes();
    let mut reader = FrameReader::new(input, frame_bytes);
    let mut resampler =
        StreamResampler::new(output, config).context("failed to create resampler")?;

    let mut buf = vec![0u8; (CHUNK_BYTES / frame_bytes).max(1) * frame_bytes];
    loop {
        let n = reader.fill(&mut buf).context("failed to read input")?;
        if n == 0 {
            break;
        }
        match resampler.resample(&buf[..n]) {
            Ok(_) => {}
            // A short read means the input is exhausted: only the final
            // chunk may be skipped.
            Err(ResampleError::InsufficientInput { frames }) if n < buf.len() => {
                warn!(frames, "final chunk too short to produce output, skipped");
            }
            Err(e) => return Err(e).context("resampling failed"),
        }
    }

    if reader.pending() > 0 {
        bail!(
            "input ends with a partial frame ({} of {} bytes)",
            reader.pending(),
            frame_bytes
        );
    }

    resampler.close().context("failed to flush resampler")?;
    Ok(resampler.stats())
}
