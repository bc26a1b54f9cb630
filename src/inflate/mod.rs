//! Decompression entry points
//!
//! One-shot decompression detects zlib or gzip framing from the header,
//! runs a session to the end of the stream and returns the output. Raw
//! DEFLATE has no header and is only reachable through the `_with` variants.

mod reader;

pub use reader::InflateReader;

use crate::buffer::{ExternalBuffer, OutputBuffer};
use crate::common::{Framing, DEFAULT_WINDOW_BITS};
use crate::session::Session;
use crate::{CzlibError, Result};

/// Identify zlib or gzip framing, failing on anything else
pub fn detect_framing(data: &[u8]) -> Result<Framing> {
    if data.is_empty() {
        return Err(CzlibError::EmptyInput);
    }
    Framing::detect(data).ok_or_else(|| {
        CzlibError::CorruptStream("unrecognised header: neither zlib nor gzip".to_string())
    })
}

/// Decompress a zlib or gzip stream, copying the output
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let framing = detect_framing(data)?;
    decompress_with(data, framing)
}

/// Decompress a stream of known framing, copying the output
pub fn decompress_with(data: &[u8], framing: Framing) -> Result<Vec<u8>> {
    run(data, framing).map(OutputBuffer::into_managed)
}

/// Decompress a zlib or gzip stream, handing over the output storage
pub fn unsafe_decompress(data: &[u8]) -> Result<ExternalBuffer> {
    let framing = detect_framing(data)?;
    unsafe_decompress_with(data, framing)
}

/// Decompress a stream of known framing, handing over the output storage
pub fn unsafe_decompress_with(data: &[u8], framing: Framing) -> Result<ExternalBuffer> {
    run(data, framing).map(OutputBuffer::into_external)
}

fn run(data: &[u8], framing: Framing) -> Result<OutputBuffer> {
    if data.is_empty() {
        return Err(CzlibError::EmptyInput);
    }
    let mut session = Session::decompressor(framing, DEFAULT_WINDOW_BITS)?;
    session.run(data)
}
