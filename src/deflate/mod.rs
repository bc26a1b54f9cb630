//! Compression entry points
//!
//! One-shot compression builds a session, drives it to the end of the
//! stream and returns either a managed copy of the output or the session's
//! own storage as an [`ExternalBuffer`]. The streaming counterpart is
//! [`DeflateWriter`].

mod writer;

pub use writer::DeflateWriter;

use crate::buffer::{ExternalBuffer, OutputBuffer};
use crate::common::{CompressOptions, Level};
use crate::session::Session;
use crate::Result;

/// Compress `data` with the given options, copying the output
pub fn compress_with(data: &[u8], options: &CompressOptions) -> Result<Vec<u8>> {
    run(data, options).map(OutputBuffer::into_managed)
}

/// Compress `data` with the given options, handing over the output storage
pub fn unsafe_compress_with(data: &[u8], options: &CompressOptions) -> Result<ExternalBuffer> {
    run(data, options).map(OutputBuffer::into_external)
}

/// Compress `data` as zlib at an explicit level
pub fn compress_level(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let options = CompressOptions::default().with_level(Level::new(level)?);
    compress_with(data, &options)
}

fn run(data: &[u8], options: &CompressOptions) -> Result<OutputBuffer> {
    let mut session = Session::compressor(options)?;
    session.run(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Framing;
    use crate::CzlibError;

    #[test]
    fn test_empty_input_produces_minimal_streams() {
        let zlib = compress_with(&[], &CompressOptions::default()).unwrap();
        assert_eq!(zlib, [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);

        let raw = compress_with(&[], &CompressOptions::default().with_framing(Framing::Raw)).unwrap();
        assert_eq!(raw, [0x03, 0x00]);

        let gzip = compress_with(&[], &CompressOptions::default().with_framing(Framing::Gzip)).unwrap();
        // 10-byte header + empty block + CRC-32 + ISIZE
        assert_eq!(gzip.len(), 20);
        assert_eq!(&gzip[..3], &[0x1F, 0x8B, 0x08]);
        assert_eq!(&gzip[12..], &[0u8; 8]);
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(compress_level(b"x", 10), Err(CzlibError::InvalidLevel(10))));
        assert!(matches!(compress_level(b"x", -5), Err(CzlibError::InvalidLevel(-5))));
    }

    #[test]
    fn test_invalid_window_bits() {
        let options = CompressOptions::default().with_window_bits(20);
        assert!(matches!(compress_with(b"x", &options), Err(CzlibError::InitError(_))));
    }

    #[test]
    fn test_level_header_bits() {
        // FLEVEL in the zlib header reflects the level
        assert_eq!(&compress_level(b"abc", 1).unwrap()[..2], &[0x78, 0x01]);
        assert_eq!(&compress_level(b"abc", 9).unwrap()[..2], &[0x78, 0xDA]);
        assert_eq!(&compress_level(b"abc", -1).unwrap()[..2], &[0x78, 0x9C]);
    }

    #[test]
    fn test_unsafe_matches_managed() {
        let data = b"the same bytes either way, the same bytes either way";
        let managed = compress_with(data, &CompressOptions::default()).unwrap();
        let external = unsafe_compress_with(data, &CompressOptions::default()).unwrap();
        assert_eq!(&*external, &managed[..]);
        external.release();
    }
}
