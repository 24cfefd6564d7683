use std::io::{self, ErrorKind, Read};

/// Size in bytes of a FITS logical record. Header and data sections both start on a
/// multiple of this.
pub const BLOCK_LEN: usize = 2880;

/// Number of bytes needed to pad `len` up to the next block boundary.
#[must_use]
pub fn padding(len: usize) -> usize {
    (BLOCK_LEN - len % BLOCK_LEN) % BLOCK_LEN
}

/// Blocks wraps a reader and keeps track of the stream offset so sections can be
/// aligned on block boundaries.
pub(crate) struct Blocks<R> {
    reader: R,
    offset: usize,
}

impl<R> Blocks<R>
where
    R: Read,
{
    pub fn new(reader: R) -> Self {
        Blocks { reader, offset: 0 }
    }

    /// Fill `buf` completely. Returns `Ok(false)` if the stream ended first, in which
    /// case the contents of `buf` are unspecified.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<bool, io::Error> {
        if let Err(err) = self.reader.read_exact(buf) {
            if err.kind() == ErrorKind::UnexpectedEof {
                return Ok(false);
            }
            return Err(err);
        }
        self.offset += buf.len();
        Ok(true)
    }

    /// Discard bytes up to the next block boundary. Returns `Ok(false)` if the stream
    /// ended first.
    pub fn align(&mut self) -> Result<bool, io::Error> {
        let mut pad = vec![0u8; padding(self.offset)];
        self.fill(&mut pad)
    }

    /// Read up to `len` bytes. Fewer are returned only if the stream ends.
    ///
    /// Nothing is preallocated for `len`; the buffer only grows with the bytes read.
    pub fn take(&mut self, len: usize) -> Result<Vec<u8>, io::Error> {
        let mut buf = Vec::new();
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        self.offset += buf.len();
        Ok(buf)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}
