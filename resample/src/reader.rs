//! Frame-aligned reader wrapper.

use std::io::{self, Read};

/// Wraps an `io::Read` so that reads always return whole frames.
///
/// Partial frame bytes are kept internally and prepended to the next read.
/// Use it in front of a [`StreamResampler`](crate::StreamResampler), which
/// rejects chunks that are not frame aligned.
pub struct FrameReader<R: Read> {
    /// Leftover bytes (up to frame_bytes - 1).
    buffer: Vec<u8>,
    /// Number of valid bytes in buffer.
    buffered: usize,
    /// Bytes per frame.
    frame_bytes: usize,
    /// Inner reader.
    inner: R,
}

impl<R: Read> FrameReader<R> {
    /// Creates a reader returning data in multiples of `frame_bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `frame_bytes` is 0.
    pub fn new(reader: R, frame_bytes: usize) -> Self {
        assert!(frame_bytes > 0, "frame size must be positive");
        Self {
            buffer: vec![0u8; frame_bytes - 1],
            buffered: 0,
            frame_bytes,
            inner: reader,
        }
    }

    /// Returns the frame size in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Returns the number of buffered bytes that do not form a whole frame.
    ///
    /// Non-zero after the source is exhausted means it ended mid-frame.
    pub fn pending(&self) -> usize {
        self.buffered
    }

    /// Returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads until `buf` (truncated to whole frames) is full or the source is
    /// exhausted. Returns the number of bytes read, always a multiple of the
    /// frame size; 0 means end of input.
    pub fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let aligned = (buf.len() / self.frame_bytes) * self.frame_bytes;
        let mut n = 0;
        while n < aligned {
            match self.read(&mut buf[n..aligned]) {
                Ok(0) => break,
                Ok(rn) => n += rn,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(n)
    }
}

impl<R: Read> Read for FrameReader<R> {
    /// Reads data into buf, returning 0 or a multiple of the frame size.
    ///
    /// Returns `InvalidInput` if `buf` is smaller than one frame. A return of
    /// 0 means end of input; check [`FrameReader::pending`] for a trailing
    /// partial frame.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.len() < self.frame_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer too small for frame",
            ));
        }

        let aligned_len = (buf.len() / self.frame_bytes) * self.frame_bytes;
        let buf = &mut buf[..aligned_len];

        loop {
            let mut n = self.buffered;
            buf[..n].copy_from_slice(&self.buffer[..n]);

            let rn = self.inner.read(&mut buf[n..])?;
            if rn == 0 {
                // End of input: keep the partial frame where it was.
                return Ok(0);
            }
            n += rn;
            self.buffered = 0;

            let remainder = n % self.frame_bytes;
            let start = n - remainder;
            self.buffer[..remainder].copy_from_slice(&buf[start..n]);
            self.buffered = remainder;

            if start > 0 {
                return Ok(start);
            }
        }
    }
}
