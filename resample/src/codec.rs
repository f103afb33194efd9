//! Conversion between interleaved PCM bytes and normalized samples.

use crate::format::SampleFormat;

const I16_SCALE: f64 = 32768.0;
const I32_SCALE: f64 = 2147483648.0;

/// Decodes little-endian PCM bytes into normalized samples, appending to `out`.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode(format: SampleFormat, data: &[u8], out: &mut Vec<f64>) {
    out.reserve(data.len() / format.byte_width());
    match format {
        SampleFormat::Float32 => out.extend(
            data.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64),
        ),
        SampleFormat::Float64 => out.extend(data.chunks_exact(8).map(|b| {
            f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })),
        SampleFormat::Int32 => out.extend(
            data.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64 / I32_SCALE),
        ),
        SampleFormat::Int16 => out.extend(
            data.chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f64 / I16_SCALE),
        ),
    }
}

/// Encodes normalized samples into little-endian PCM bytes.
///
/// Integer formats are rounded and clamped to their range. Returns the
/// number of bytes written, which is `samples.len() * byte_width`.
///
/// # Panics
///
/// Panics if `out` is too small.
pub fn encode(format: SampleFormat, samples: &[f64], out: &mut [u8]) -> usize {
    let width = format.byte_width();
    let n = samples.len() * width;
    let dst = out[..n].chunks_exact_mut(width);
    match format {
        SampleFormat::Float32 => {
            for (d, &s) in dst.zip(samples) {
                d.copy_from_slice(&(s as f32).to_le_bytes());
            }
        }
        SampleFormat::Float64 => {
            for (d, &s) in dst.zip(samples) {
                d.copy_from_slice(&s.to_le_bytes());
            }
        }
        SampleFormat::Int32 => {
            for (d, &s) in dst.zip(samples) {
                let v = (s * I32_SCALE).round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                d.copy_from_slice(&v.to_le_bytes());
            }
        }
        SampleFormat::Int16 => {
            for (d, &s) in dst.zip(samples) {
                let v = (s * I16_SCALE).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                d.copy_from_slice(&v.to_le_bytes());
            }
        }
    }
    n
}
