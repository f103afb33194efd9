//! WAV input handling.
//!
//! Only the canonical 44-byte header is recognized; the sample data that
//! follows must match the declared stream settings.

use std::io::{self, Seek, SeekFrom};
use std::path::Path;

/// Size of a canonical RIFF/WAVE header.
pub const WAV_HEADER_LEN: u64 = 44;

/// Reports whether `path` names a WAV file (by extension, any case).
pub fn is_wav(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Positions `input` just past the header.
pub fn skip_header<S: Seek>(input: &mut S) -> io::Result<()> {
    input.seek(SeekFrom::Start(WAV_HEADER_LEN))?;
    Ok(())
}
