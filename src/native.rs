//! Native codec binding
//!
//! Thin marshaling layer over the `flate2` low-level engine. A
//! [`NativeHandle`] owns one engine instance; dropping it releases the
//! engine's internal state, so destruction happens on every exit path.

use crate::common::{check_window_bits, Direction, Framing, Level};
use crate::{CzlibError, Result};
use flate2::{Compress, Decompress, FlushCompress, FlushDecompress, Status};

/// Flush mode passed to a single engine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Let the engine decide when to emit output
    None,
    /// Emit everything buffered so far, aligned to a byte boundary
    Sync,
    /// Emit everything and write the framing trailer
    Finish,
}

/// Outcome of a single engine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Input exhausted without reaching the end of the stream
    NeedMoreInput,
    /// The output window was filled; call again with fresh space
    OutputFull,
    /// The framing's logical end was reached
    StreamEnd,
}

/// Bytes moved by one engine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Input bytes consumed
    pub consumed: usize,
    /// Output bytes produced
    pub produced: usize,
    /// Engine status after the step
    pub status: StepStatus,
}

#[derive(Debug)]
enum Engine {
    Deflate(Compress),
    Inflate(Decompress),
}

/// Exclusive owner of one engine instance
#[derive(Debug)]
pub struct NativeHandle {
    engine: Engine,
    framing: Framing,
    level: Level,
    window_bits: u8,
}

impl NativeHandle {
    /// Initialise an engine for the given direction and framing.
    ///
    /// `level` is ignored for decompression.
    pub fn init(direction: Direction, framing: Framing, level: Level, window_bits: u8) -> Result<Self> {
        let window_bits = check_window_bits(window_bits)?;
        let engine = build_engine(direction, framing, level, window_bits);

        log::debug!(
            "init {:?} engine: framing={} level={} window_bits={}",
            direction,
            framing.name(),
            level.get(),
            window_bits
        );

        Ok(Self {
            engine,
            framing,
            level,
            window_bits,
        })
    }

    /// Direction this engine runs in
    pub fn direction(&self) -> Direction {
        match self.engine {
            Engine::Deflate(_) => Direction::Compress,
            Engine::Inflate(_) => Direction::Decompress,
        }
    }

    /// Feed `input`, write into `output`, and report how far the engine got.
    pub fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Step> {
        let (before_in, before_out) = self.totals();

        let raw_status = match &mut self.engine {
            Engine::Deflate(engine) => engine
                .compress(input, output, compress_flush(flush))
                .map_err(|e| CzlibError::EncodeFailure(e.to_string()))?,
            Engine::Inflate(engine) => engine
                .decompress(input, output, decompress_flush(flush))
                .map_err(|e| CzlibError::CorruptStream(e.to_string()))?,
        };

        Ok(self.finish_step(before_in, before_out, raw_status, output.len()))
    }

    /// Like [`step`](Self::step), but writes into the spare capacity of
    /// `output` and extends its length by the bytes produced.
    ///
    /// The spare capacity is never zero-filled first.
    pub fn step_vec(&mut self, input: &[u8], output: &mut Vec<u8>, flush: Flush) -> Result<Step> {
        let (before_in, before_out) = self.totals();
        let window = output.capacity() - output.len();

        let raw_status = match &mut self.engine {
            Engine::Deflate(engine) => engine
                .compress_vec(input, output, compress_flush(flush))
                .map_err(|e| CzlibError::EncodeFailure(e.to_string()))?,
            Engine::Inflate(engine) => engine
                .decompress_vec(input, output, decompress_flush(flush))
                .map_err(|e| CzlibError::CorruptStream(e.to_string()))?,
        };

        Ok(self.finish_step(before_in, before_out, raw_status, window))
    }

    fn finish_step(&self, before_in: u64, before_out: u64, raw_status: Status, window: usize) -> Step {
        let (after_in, after_out) = self.totals();
        let consumed = delta(before_in, after_in);
        let produced = delta(before_out, after_out);

        let status = match raw_status {
            Status::StreamEnd => StepStatus::StreamEnd,
            _ if window > 0 && produced == window => StepStatus::OutputFull,
            _ => StepStatus::NeedMoreInput,
        };

        log::trace!(
            "step {:?}: consumed={} produced={} status={:?}",
            self.direction(),
            consumed,
            produced,
            status
        );

        Step {
            consumed,
            produced,
            status,
        }
    }

    /// Return the engine to its freshly initialised state
    pub fn reset(&mut self) {
        match &mut self.engine {
            Engine::Deflate(engine) => engine.reset(),
            // the engine's own reset forgets gzip mode
            Engine::Inflate(_) => {
                self.engine = build_engine(
                    Direction::Decompress,
                    self.framing,
                    self.level,
                    self.window_bits,
                );
            }
        }
        log::debug!("reset {:?} engine", self.direction());
    }

    /// Total input bytes consumed since init or reset
    pub fn total_in(&self) -> u64 {
        self.totals().0
    }

    /// Total output bytes produced since init or reset
    pub fn total_out(&self) -> u64 {
        self.totals().1
    }

    fn totals(&self) -> (u64, u64) {
        match &self.engine {
            Engine::Deflate(engine) => (engine.total_in(), engine.total_out()),
            Engine::Inflate(engine) => (engine.total_in(), engine.total_out()),
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        log::debug!("destroy {:?} engine", self.direction());
    }
}

fn build_engine(direction: Direction, framing: Framing, level: Level, window_bits: u8) -> Engine {
    match (direction, framing) {
        (Direction::Compress, Framing::Raw) => Engine::Deflate(Compress::new_with_window_bits(
            level.to_compression(),
            false,
            window_bits,
        )),
        (Direction::Compress, Framing::Zlib) => Engine::Deflate(Compress::new_with_window_bits(
            level.to_compression(),
            true,
            window_bits,
        )),
        (Direction::Compress, Framing::Gzip) => {
            Engine::Deflate(Compress::new_gzip(level.to_compression(), window_bits))
        }
        (Direction::Decompress, Framing::Raw) => {
            Engine::Inflate(Decompress::new_with_window_bits(false, window_bits))
        }
        (Direction::Decompress, Framing::Zlib) => {
            Engine::Inflate(Decompress::new_with_window_bits(true, window_bits))
        }
        (Direction::Decompress, Framing::Gzip) => Engine::Inflate(Decompress::new_gzip(window_bits)),
    }
}

fn compress_flush(flush: Flush) -> FlushCompress {
    match flush {
        Flush::None => FlushCompress::None,
        Flush::Sync => FlushCompress::Sync,
        Flush::Finish => FlushCompress::Finish,
    }
}

fn decompress_flush(flush: Flush) -> FlushDecompress {
    match flush {
        Flush::None => FlushDecompress::None,
        Flush::Sync => FlushDecompress::Sync,
        Flush::Finish => FlushDecompress::Finish,
    }
}

fn delta(before: u64, after: u64) -> usize {
    usize::try_from(after.saturating_sub(before)).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_rejects_bad_window_bits() {
        let err = NativeHandle::init(Direction::Compress, Framing::Zlib, Level::DEFAULT, 8);
        assert!(matches!(err, Err(CzlibError::InitError(_))));

        let err = NativeHandle::init(Direction::Decompress, Framing::Gzip, Level::DEFAULT, 16);
        assert!(matches!(err, Err(CzlibError::InitError(_))));
    }

    #[test]
    fn test_step_compress_finish() {
        let mut handle =
            NativeHandle::init(Direction::Compress, Framing::Zlib, Level::DEFAULT, 15).unwrap();
        let mut out = [0u8; 256];
        let step = handle.step(b"hello", &mut out, Flush::Finish).unwrap();

        assert_eq!(step.consumed, 5);
        assert_eq!(step.status, StepStatus::StreamEnd);
        assert_eq!(&out[..2], &[0x78, 0x9C]);
        assert_eq!(handle.total_in(), 5);
        assert_eq!(handle.total_out(), step.produced as u64);
    }

    #[test]
    fn test_step_reports_output_full() {
        let mut handle =
            NativeHandle::init(Direction::Compress, Framing::Raw, Level::NONE, 15).unwrap();
        let input = vec![7u8; 1000];
        let mut out = [0u8; 16];
        let step = handle.step(&input, &mut out, Flush::Finish).unwrap();

        assert_eq!(step.produced, 16);
        assert_eq!(step.status, StepStatus::OutputFull);
    }

    #[test]
    fn test_step_vec_fills_spare_capacity() {
        let mut handle =
            NativeHandle::init(Direction::Compress, Framing::Raw, Level::NONE, 15).unwrap();
        let input = vec![7u8; 1000];
        let mut out = Vec::with_capacity(16);
        out.push(0xAA);

        let step = handle.step_vec(&input, &mut out, Flush::Finish).unwrap();
        assert_eq!(step.produced, out.capacity() - 1);
        assert_eq!(step.status, StepStatus::OutputFull);
        assert_eq!(out.len(), out.capacity());
        assert_eq!(out[0], 0xAA);

        out.reserve_exact(2000);
        let step = handle.step_vec(&input[step.consumed..], &mut out, Flush::Finish).unwrap();
        assert_eq!(step.status, StepStatus::StreamEnd);
    }

    #[test]
    fn test_step_inflate_needs_input() {
        let mut deflater =
            NativeHandle::init(Direction::Compress, Framing::Zlib, Level::DEFAULT, 15).unwrap();
        let mut compressed = [0u8; 256];
        let done = deflater
            .step(b"some data to split", &mut compressed, Flush::Finish)
            .unwrap();
        let compressed = &compressed[..done.produced];

        let mut inflater =
            NativeHandle::init(Direction::Decompress, Framing::Zlib, Level::DEFAULT, 15).unwrap();
        let mut out = [0u8; 256];
        let step = inflater
            .step(&compressed[..compressed.len() - 3], &mut out, Flush::None)
            .unwrap();
        assert_eq!(step.status, StepStatus::NeedMoreInput);
    }

    #[test]
    fn test_step_inflate_rejects_garbage() {
        let mut handle =
            NativeHandle::init(Direction::Decompress, Framing::Zlib, Level::DEFAULT, 15).unwrap();
        let mut out = [0u8; 64];
        let err = handle.step(&[0x78, 0x9D, 0xFF, 0xFF], &mut out, Flush::None);
        assert!(matches!(err, Err(CzlibError::CorruptStream(_))));
    }

    #[test]
    fn test_reset_allows_second_stream() {
        let mut handle =
            NativeHandle::init(Direction::Compress, Framing::Gzip, Level::DEFAULT, 15).unwrap();
        let mut first = [0u8; 128];
        let a = handle.step(b"abc", &mut first, Flush::Finish).unwrap();
        handle.reset();
        assert_eq!(handle.total_in(), 0);

        let mut second = [0u8; 128];
        let b = handle.step(b"abc", &mut second, Flush::Finish).unwrap();
        assert_eq!(first[..a.produced], second[..b.produced]);
    }
}
