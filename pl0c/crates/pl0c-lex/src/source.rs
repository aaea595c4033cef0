//! Owned character sources.
//!
//! The input buffer conceptually owns a stream of source bytes. The
//! stream may come from a file on disk, an in-memory string (tests,
//! library callers), or a caller-supplied reader. All three feed the
//! buffer through the single [`Source::read_block`] primitive and are
//! released when the buffer is dropped or reinitialized.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

/// A source of raw input bytes.
pub enum Source {
    /// An open file.
    File(File),
    /// In-memory bytes.
    Memory(Cursor<Vec<u8>>),
    /// A caller-supplied reader.
    Borrowed(Box<dyn Read>),
}

impl Source {
    /// Open a file as a source. Open failure surfaces to the caller.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Source::File(File::open(path)?))
    }

    /// Wrap an in-memory string.
    pub fn from_str(text: &str) -> Self {
        Source::Memory(Cursor::new(text.as_bytes().to_vec()))
    }

    /// Wrap in-memory bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Source::Memory(Cursor::new(bytes))
    }

    /// Wrap an arbitrary reader.
    pub fn from_reader(reader: impl Read + 'static) -> Self {
        Source::Borrowed(Box::new(reader))
    }

    /// Fill `block` as far as possible, retrying on short reads until
    /// the block is full or the stream is exhausted. Returns the number
    /// of bytes read; anything less than `block.len()` means EOF.
    pub fn read_block(&mut self, block: &mut [u8]) -> io::Result<usize> {
        let reader: &mut dyn Read = match self {
            Source::File(f) => f,
            Source::Memory(c) => c,
            Source::Borrowed(r) => r.as_mut(),
        };

        let mut filled = 0;
        while filled < block.len() {
            match reader.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_block() {
        let mut source = Source::from_str("abc");
        let mut block = [0u8; 8];
        let n = source.read_block(&mut block).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&block[..3], b"abc");
    }

    #[test]
    fn test_memory_exhausts() {
        let mut source = Source::from_str("xy");
        let mut block = [0u8; 2];
        assert_eq!(source.read_block(&mut block).unwrap(), 2);
        assert_eq!(source.read_block(&mut block).unwrap(), 0);
    }

    #[test]
    fn test_borrowed_reader() {
        let data: &[u8] = b"read me";
        let mut source = Source::from_reader(data);
        let mut block = [0u8; 16];
        let n = source.read_block(&mut block).unwrap();
        assert_eq!(&block[..n], b"read me");
    }

    #[test]
    fn test_open_missing_file_is_error() {
        assert!(Source::open("definitely/not/a/real/path.pl0").is_err());
    }
}
