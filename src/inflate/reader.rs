//! InflateReader - Streaming decompression reader
//!
//! Pulls compressed bytes from a source, feeds them through a long-lived
//! decompression session and hands decompressed bytes out in whatever
//! amounts the caller asks for. Short reads are normal; only `Ok(0)` means
//! the stream ended cleanly.

use crate::common::{Framing, DEFAULT_WINDOW_BITS, MIN_STREAM_BUFFER};
use crate::native::{Flush, StepStatus};
use crate::session::Session;
use crate::{CzlibError, Result};
use std::io::{self, Read};

/// Streaming decompression reader implementing Read trait
#[derive(Debug)]
pub struct InflateReader<R: Read> {
    reader: R,
    framing: Option<Framing>,
    session: Option<Session>,
    input_buffer: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    output_buffer: Vec<u8>,
    output_pos: usize,
    output_len: usize,
    source_bytes: u64,
    finished: bool,
}

impl<R: Read> InflateReader<R> {
    /// Create a reader that detects zlib or gzip framing from the stream
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self::build(reader, None, None))
    }

    /// Create a reader for a known framing (the only way to read raw DEFLATE)
    pub fn with_framing(reader: R, framing: Framing) -> Result<Self> {
        let session = Session::decompressor(framing, DEFAULT_WINDOW_BITS)?;
        Ok(Self::build(reader, Some(framing), Some(session)))
    }

    fn build(reader: R, framing: Option<Framing>, session: Option<Session>) -> Self {
        Self {
            reader,
            framing,
            session,
            input_buffer: vec![0; MIN_STREAM_BUFFER],
            input_pos: 0,
            input_len: 0,
            output_buffer: vec![0; MIN_STREAM_BUFFER],
            output_pos: 0,
            output_len: 0,
            source_bytes: 0,
            finished: false,
        }
    }

    /// Framing in use, once known
    pub fn framing(&self) -> Option<Framing> {
        self.framing
    }

    /// Whether the end of the compressed stream has been reached
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Compressed bytes pulled from the source so far
    pub fn source_bytes(&self) -> u64 {
        self.source_bytes
    }

    /// Give back the source
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Copy up to `buf.len()` decompressed bytes into `buf`.
    ///
    /// Returns `Ok(0)` only at the clean end of the stream.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.output_pos < self.output_len {
                let to_copy = buf.len().min(self.output_len - self.output_pos);
                buf[..to_copy]
                    .copy_from_slice(&self.output_buffer[self.output_pos..self.output_pos + to_copy]);
                self.output_pos += to_copy;
                return Ok(to_copy);
            }

            if self.finished {
                return Ok(0);
            }

            self.expand()?;
        }
    }

    /// Run the session until it produces output or the stream ends
    fn expand(&mut self) -> Result<()> {
        if self.session.is_none() {
            self.start_session()?;
        }

        loop {
            // the engine may still hold output or end-of-block bits once the
            // source is dry, so it gets one step with no input before EOF counts
            let source_dry = self.input_pos == self.input_len && self.fill_input()? == 0;

            let session = self
                .session
                .as_mut()
                .ok_or(CzlibError::InvalidState("reader has no session"))?;
            let step = session.step(
                &self.input_buffer[self.input_pos..self.input_len],
                &mut self.output_buffer,
                Flush::None,
            )?;
            self.input_pos += step.consumed;
            self.output_pos = 0;
            self.output_len = step.produced;

            if step.status == StepStatus::StreamEnd {
                session.end();
                self.finished = true;
                log::debug!(
                    "reader reached end of stream after {} source bytes",
                    self.source_bytes
                );
                return Ok(());
            }
            if step.produced > 0 {
                return Ok(());
            }
            if source_dry {
                return Err(if self.source_bytes == 0 {
                    CzlibError::EmptyInput
                } else {
                    CzlibError::TruncatedStream
                });
            }
            if step.consumed == 0 && self.input_pos < self.input_len {
                return Err(CzlibError::CorruptStream(
                    "decoder made no progress on pending input".into(),
                ));
            }
        }
    }

    /// Detect the framing from the first bytes and initialise the session
    fn start_session(&mut self) -> Result<()> {
        while self.input_len < 2 {
            if self.fill_input()? == 0 {
                break;
            }
        }

        let framing = match (self.input_len, Framing::detect(&self.input_buffer[..self.input_len])) {
            (0, _) => return Err(CzlibError::EmptyInput),
            (_, Some(framing)) => framing,
            (1, None) => return Err(CzlibError::TruncatedStream),
            (_, None) => {
                return Err(CzlibError::CorruptStream(
                    "unrecognised header: neither zlib nor gzip".to_string(),
                ))
            }
        };

        log::debug!("reader detected {} framing", framing.name());
        self.framing = Some(framing);
        self.session = Some(Session::decompressor(framing, DEFAULT_WINDOW_BITS)?);
        Ok(())
    }

    /// Read more compressed bytes, appending to unconsumed input
    fn fill_input(&mut self) -> Result<usize> {
        if self.input_pos == self.input_len {
            self.input_pos = 0;
            self.input_len = 0;
        }

        loop {
            match self.reader.read(&mut self.input_buffer[self.input_len..]) {
                Ok(n) => {
                    self.input_len += n;
                    self.source_bytes += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(CzlibError::Source(e)),
            }
        }
    }
}

impl<R: Read> Read for InflateReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_chunk(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CompressOptions;
    use crate::compress_with;
    use std::io::Cursor;

    /// Source that hands out one byte per read
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((byte, rest)), Some(slot)) => {
                    *slot = *byte;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_detects_gzip() {
        let gzip = compress_with(b"gzip body", &CompressOptions::default().with_framing(Framing::Gzip))
            .unwrap();
        let mut reader = InflateReader::new(Cursor::new(gzip)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"gzip body");
        assert_eq!(reader.framing(), Some(Framing::Gzip));
        assert!(reader.is_finished());
    }

    #[test]
    fn test_one_byte_source() {
        let data = b"trickled through one byte at a time".repeat(20);
        let zlib = compress_with(&data, &CompressOptions::default()).unwrap();
        let mut reader = InflateReader::new(Trickle(&zlib)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_short_reads_respect_capacity() {
        let data = vec![42u8; 5000];
        let zlib = compress_with(&data, &CompressOptions::default()).unwrap();
        let mut reader = InflateReader::new(Cursor::new(zlib)).unwrap();

        let mut buf = [0u8; 7];
        let mut total = 0;
        loop {
            let n = reader.read_chunk(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert!(n <= 7);
            assert!(buf[..n].iter().all(|&b| b == 42));
            total += n;
        }
        assert_eq!(total, 5000);
        // end is sticky
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_raw_stream_finishing_after_source_eof() {
        // last window fills while the engine still holds a match copy and
        // the end-of-block code; raw framing has no trailer left to read
        let data: Vec<u8> = (0..147_559usize).map(|i| ((i / 300) % 7) as u8).collect();
        let options = CompressOptions::default()
            .with_framing(Framing::Raw)
            .with_level(crate::Level::BEST);
        let raw = compress_with(&data, &options).unwrap();

        let mut reader = InflateReader::with_framing(Cursor::new(&raw), Framing::Raw).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert!(reader.is_finished());

        let mut reader = InflateReader::with_framing(Trickle(&raw), Framing::Raw).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_empty_source() {
        let mut reader = InflateReader::new(Cursor::new(Vec::new())).unwrap();
        let mut buf = [0u8; 16];
        assert!(matches!(reader.read_chunk(&mut buf), Err(CzlibError::EmptyInput)));

        let mut reader = InflateReader::with_framing(Cursor::new(Vec::new()), Framing::Raw).unwrap();
        assert!(matches!(reader.read_chunk(&mut buf), Err(CzlibError::EmptyInput)));
    }

    #[test]
    fn test_truncated_source() {
        let zlib = compress_with(&[9u8; 1000], &CompressOptions::default()).unwrap();
        let cut = &zlib[..zlib.len() - 1];
        let mut reader = InflateReader::new(Cursor::new(cut)).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut reader = InflateReader::new(Cursor::new(vec![0x78])).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(reader.read_chunk(&mut buf), Err(CzlibError::TruncatedStream)));
    }

    #[test]
    fn test_source_error_passes_through() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }

        let mut reader = InflateReader::new(Broken).unwrap();
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
