//! Common types and constants for the DEFLATE codec family
//!
//! This module defines the framing selector, compression level, option
//! structures and the error type shared by the one-shot and streaming
//! interfaces.

use flate2::Compression;
use std::io;
use thiserror::Error;

/// Header/trailer wrapper around a DEFLATE bitstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framing {
    /// Headerless DEFLATE (RFC 1951)
    Raw,
    /// 2-byte header and Adler-32 trailer (RFC 1950)
    Zlib,
    /// 10-byte+ header, CRC-32 and length trailer (RFC 1952)
    Gzip,
}

impl Framing {
    /// Identify the framing of a compressed stream from its leading bytes.
    ///
    /// Only zlib and gzip carry a recognisable header; raw DEFLATE is never
    /// reported and must be selected explicitly.
    pub fn detect(header: &[u8]) -> Option<Self> {
        match header {
            [GZIP_ID1, GZIP_ID2, ..] => Some(Framing::Gzip),
            [cmf, flg, ..] if is_zlib_header(*cmf, *flg) => Some(Framing::Zlib),
            _ => None,
        }
    }

    /// Short lowercase name, as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Framing::Raw => "raw",
            Framing::Zlib => "zlib",
            Framing::Gzip => "gzip",
        }
    }
}

fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    let method = cmf & 0x0F;
    let cinfo = cmf >> 4;
    method == ZLIB_METHOD_DEFLATE && cinfo <= 7 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

/// Direction a codec session runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Raw bytes in, DEFLATE stream out
    Compress,
    /// DEFLATE stream in, raw bytes out
    Decompress,
}

/// Compression level in the conventional `-1..=9` range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level(i32);

impl Level {
    /// Engine default (equivalent to 6)
    pub const DEFAULT: Level = Level(-1);
    /// Stored blocks only
    pub const NONE: Level = Level(0);
    /// Fastest compression
    pub const FASTEST: Level = Level(1);
    /// Best compression ratio
    pub const BEST: Level = Level(9);

    /// Create a level, rejecting values outside `-1..=9`
    pub fn new(level: i32) -> Result<Self> {
        match level {
            -1..=9 => Ok(Level(level)),
            _ => Err(CzlibError::InvalidLevel(level)),
        }
    }

    /// Raw numeric value
    pub fn get(&self) -> i32 {
        self.0
    }

    pub(crate) fn to_compression(self) -> Compression {
        match u32::try_from(self.0) {
            Ok(level) => Compression::new(level),
            Err(_) => Compression::default(),
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::DEFAULT
    }
}

/// Validate a window-bits value for the engine
pub(crate) fn check_window_bits(window_bits: u8) -> Result<u8> {
    if (MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
        Ok(window_bits)
    } else {
        Err(CzlibError::InitError(format!(
            "window bits {window_bits} outside {MIN_WINDOW_BITS}..={MAX_WINDOW_BITS}"
        )))
    }
}

/// Parameters for a one-shot compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Output framing
    pub framing: Framing,
    /// Compression level
    pub level: Level,
    /// Base-2 logarithm of the LZ77 window size
    pub window_bits: u8,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            framing: Framing::Zlib,
            level: Level::DEFAULT,
            window_bits: DEFAULT_WINDOW_BITS,
        }
    }
}

impl CompressOptions {
    /// Replace the framing
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Replace the level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Replace the window bits
    pub fn with_window_bits(mut self, window_bits: u8) -> Self {
        self.window_bits = window_bits;
        self
    }
}

/// Configuration for the streaming writer and reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Output framing (writer only; the reader detects it)
    pub framing: Framing,
    /// Compression level (writer only)
    pub level: Level,
    /// Base-2 logarithm of the LZ77 window size
    pub window_bits: u8,
    /// Size of the internal engine window
    pub buffer_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            framing: Framing::Zlib,
            level: Level::DEFAULT,
            window_bits: DEFAULT_WINDOW_BITS,
            buffer_size: MIN_STREAM_BUFFER,
        }
    }
}

impl StreamOptions {
    /// Default window and fastest level
    pub fn low_memory() -> Self {
        Self {
            level: Level::FASTEST,
            ..Self::default()
        }
    }

    /// Larger engine window and best level
    pub fn high_ratio() -> Self {
        Self {
            level: Level::BEST,
            buffer_size: 64 * 1024,
            ..Self::default()
        }
    }

    /// Replace the framing
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Replace the level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Engine window size actually used, never below the streaming minimum
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(MIN_STREAM_BUFFER)
    }
}

/// Error type for codec operations
#[derive(Debug, Error)]
pub enum CzlibError {
    /// The engine rejected the level/framing/window combination
    #[error("Codec initialisation failed: {0}")]
    InitError(String),

    /// Level outside `-1..=9`
    #[error("Invalid compression level: {0} (expected -1..=9)")]
    InvalidLevel(i32),

    /// Zero-length input handed to a decompressor
    #[error("Empty input: no compressed stream to decode")]
    EmptyInput,

    /// Malformed compressed data or checksum mismatch
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// One-shot input ended before the stream did
    #[error("Truncated input: compressed data ends before the end of stream")]
    TruncatedInput,

    /// Streaming source exhausted before the stream did
    #[error("Truncated stream: source exhausted before the end of stream")]
    TruncatedStream,

    /// Underlying reader failed
    #[error("Source error: {0}")]
    Source(#[source] io::Error),

    /// Underlying writer failed
    #[error("Sink error: {0}")]
    Sink(#[source] io::Error),

    /// The engine failed while compressing
    #[error("Encode failure: {0}")]
    EncodeFailure(String),

    /// Output buffer could not be grown
    #[error("Out of memory growing output buffer to {requested} bytes")]
    OutOfMemory {
        /// Capacity that could not be allocated
        requested: usize,
    },

    /// Operation on a finished or failed session
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
}

impl From<CzlibError> for io::Error {
    fn from(err: CzlibError) -> Self {
        match err {
            CzlibError::Source(e) | CzlibError::Sink(e) => e,
            CzlibError::TruncatedStream | CzlibError::TruncatedInput => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err)
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CzlibError>;

/// Smallest window used by the streaming writer and reader
pub const MIN_STREAM_BUFFER: usize = 16 * 1024;

/// Smallest initial output capacity for one-shot compression
pub const MIN_COMPRESS_CAPACITY: usize = 4 * 1024;

/// Smallest initial output capacity for one-shot decompression
pub const MIN_DECOMPRESS_CAPACITY: usize = 64 * 1024;

/// Largest (and default) window bits
pub const DEFAULT_WINDOW_BITS: u8 = 15;

/// Smallest window bits the engine accepts
pub const MIN_WINDOW_BITS: u8 = 9;

/// Largest window bits the engine accepts
pub const MAX_WINDOW_BITS: u8 = 15;

/// First gzip magic byte
pub const GZIP_ID1: u8 = 0x1F;

/// Second gzip magic byte
pub const GZIP_ID2: u8 = 0x8B;

/// zlib CM value for DEFLATE
pub const ZLIB_METHOD_DEFLATE: u8 = 8;
