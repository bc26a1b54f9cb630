//! czlib - DEFLATE, zlib and gzip codec
//!
//! This crate drives a zlib-compatible DEFLATE engine through a small session
//! state machine and exposes it three ways:
//!
//! - one-shot, managed: [`compress`] / [`decompress`] return a `Vec<u8>`;
//! - one-shot, zero-copy: [`unsafe_compress`] / [`unsafe_decompress`] hand the
//!   session's output storage over as an [`ExternalBuffer`], which must be
//!   given back with [`ExternalBuffer::release`];
//! - streaming: [`DeflateWriter`] (`Write`) and [`InflateReader`] (`Read`).
//!
//! Framing is chosen with [`Framing`]: raw DEFLATE (RFC 1951), zlib
//! (RFC 1950) or gzip (RFC 1952). Decompression detects zlib and gzip from
//! the header; raw streams need the framing spelled out.
//!
//! # Example - One-shot
//!
//! ```no_run
//! use czlib::{compress, decompress, unsafe_decompress};
//!
//! let compressed = compress(b"Hello, World!")?;
//! assert_eq!(decompress(&compressed)?, b"Hello, World!");
//!
//! let view = unsafe_decompress(&compressed)?;
//! assert_eq!(&*view, b"Hello, World!");
//! view.release();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Example - Streaming
//!
//! ```no_run
//! use czlib::{DeflateWriter, Framing, InflateReader, StreamOptions};
//! use std::io::{Read, Write};
//!
//! let options = StreamOptions::default().with_framing(Framing::Gzip);
//! let mut writer = DeflateWriter::with_options(Vec::new(), options)?;
//! writer.write_all(b"streamed data")?;
//! let gzip = writer.finish()?;
//!
//! let mut reader = InflateReader::new(std::io::Cursor::new(gzip))?;
//! let mut output = Vec::new();
//! reader.read_to_end(&mut output)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Public modules
pub mod buffer;
pub mod common;
pub mod deflate;
pub mod error;
pub mod inflate;
pub mod native;
pub mod session;

// Re-export commonly used types
pub use buffer::{live_external_buffers, ExternalBuffer, Ownership};
pub use common::{
    CompressOptions, CzlibError, Direction, Framing, Level, Result, StreamOptions,
    DEFAULT_WINDOW_BITS, MIN_STREAM_BUFFER,
};
pub use deflate::{compress_level, compress_with, unsafe_compress_with, DeflateWriter};
pub use inflate::{
    decompress_with, detect_framing, unsafe_decompress, unsafe_decompress_with, InflateReader,
};

// Convenience functions

/// Compress data as zlib at the default level
///
/// # Arguments
/// * `data` - The data to compress; may be empty
///
/// # Returns
/// A vector containing the zlib stream
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    deflate::compress_with(data, &CompressOptions::default())
}

/// Compress data as zlib at the default level without copying the output
///
/// The returned buffer must be released with [`ExternalBuffer::release`].
pub fn unsafe_compress(data: &[u8]) -> Result<ExternalBuffer> {
    deflate::unsafe_compress_with(data, &CompressOptions::default())
}

/// Decompress a zlib or gzip stream
///
/// # Arguments
/// * `data` - The compressed data; the framing is detected from its header
///
/// # Returns
/// A vector containing the decompressed data
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    inflate::decompress(data)
}
