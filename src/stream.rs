//! Lazy handles for large raw payloads (`mdat`, `imda`).
//!
//! Decoding records where the payload lives in the source instead of reading
//! it. The bytes are only touched when a caller opens the range against a
//! source it still holds, and copies move at most [`CHUNK_SIZE`] bytes at a
//! time so memory use does not depend on the declared length.

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Buffer size used by every stream copy.
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("source ended after {copied} of {expected} bytes")]
    Truncated { expected: u64, copied: u64 },
    #[error("copy cancelled after {copied} bytes")]
    Cancelled { copied: u64 },
}

/// Anything a stream payload can be copied from.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Byte range of a payload inside its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamRange {
    pub offset: u64,
    pub len: u64,
}

impl StreamRange {
    pub fn new(offset: u64, len: u64) -> Self {
        StreamRange { offset, len }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// Positions `src` at the range start and returns a reader that yields
    /// exactly `len` bytes.
    pub fn open<'s, R: Read + Seek + ?Sized>(&self, src: &'s mut R) -> io::Result<RangeReader<'s, R>> {
        src.seek(SeekFrom::Start(self.offset))?;
        Ok(RangeReader {
            inner: src,
            remaining: self.len,
        })
    }

    /// Copies the range into `sink` chunk by chunk.
    ///
    /// The copy is bounded by the declared length, not by EOF: a source that
    /// runs out early yields [`StreamError::Truncated`]. `cancel` is polled
    /// between chunks.
    pub fn copy_to<R, W>(
        &self,
        src: &mut R,
        sink: &mut W,
        cancel: Option<&AtomicBool>,
    ) -> Result<u64, StreamError>
    where
        R: Read + Seek + ?Sized,
        W: Write + ?Sized,
    {
        let mut reader = self.open(src)?;
        let mut buf = vec![0u8; self.len.min(CHUNK_SIZE as u64) as usize];
        let mut copied = 0u64;

        while copied < self.len {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(StreamError::Cancelled { copied });
            }
            let want = (self.len - copied).min(buf.len() as u64) as usize;
            let n = match reader.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(StreamError::Truncated {
                    expected: self.len,
                    copied,
                });
            }
            sink.write_all(&buf[..n])?;
            copied += n as u64;
        }

        tracing::trace!(offset = self.offset, len = self.len, "stream range copied");
        Ok(copied)
    }

    /// Reads the whole range into memory. Meant for small payloads only.
    pub fn read_to_vec<R: Read + Seek + ?Sized>(&self, src: &mut R) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::with_capacity(self.len.min(CHUNK_SIZE as u64) as usize);
        self.copy_to(src, &mut out, None)?;
        Ok(out)
    }
}

/// Reader over a [`StreamRange`]; borrows the source for its lifetime.
pub struct RangeReader<'s, R: ?Sized> {
    inner: &'s mut R,
    remaining: u64,
}

impl<R: ?Sized> RangeReader<'_, R> {
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read + ?Sized> Read for RangeReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream source ended with {} bytes outstanding", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
