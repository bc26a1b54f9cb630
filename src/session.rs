//! Codec session state machine
//!
//! A [`Session`] owns one [`NativeHandle`] and tracks where the stream is:
//! `Idle -> Active -> {Finished | Errored}`. Any engine or allocation error
//! destroys the handle before the error is returned, so a failed session
//! never holds native state. Dropping a session at any point releases the
//! handle as well.
//!
//! One-shot runs drive the session to the end of the stream over a single
//! input slice, doubling the output buffer each time the engine fills it.

use crate::buffer::OutputBuffer;
use crate::common::{
    CompressOptions, Direction, Framing, Level, MIN_COMPRESS_CAPACITY, MIN_DECOMPRESS_CAPACITY,
};
use crate::native::{Flush, NativeHandle, Step, StepStatus};
use crate::{CzlibError, Result};

/// Lifecycle position of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no step taken yet
    Idle,
    /// At least one step taken, stream not ended
    Active,
    /// The framing's end was reached
    Finished,
    /// The engine or allocator failed; the handle is gone
    Errored,
}

/// One run of the codec from initialisation to completion or error
#[derive(Debug)]
pub struct Session {
    direction: Direction,
    framing: Framing,
    level: Level,
    window_bits: u8,
    handle: Option<NativeHandle>,
    state: SessionState,
}

impl Session {
    /// Initialise a session and its engine
    pub fn new(direction: Direction, framing: Framing, level: Level, window_bits: u8) -> Result<Self> {
        let handle = NativeHandle::init(direction, framing, level, window_bits)?;
        Ok(Self {
            direction,
            framing,
            level,
            window_bits,
            handle: Some(handle),
            state: SessionState::Idle,
        })
    }

    /// Compression session from one-shot options
    pub fn compressor(options: &CompressOptions) -> Result<Self> {
        Self::new(
            Direction::Compress,
            options.framing,
            options.level,
            options.window_bits,
        )
    }

    /// Decompression session for a known framing
    pub fn decompressor(framing: Framing, window_bits: u8) -> Result<Self> {
        Self::new(Direction::Decompress, framing, Level::DEFAULT, window_bits)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Direction of the session
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Framing of the session
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Whether the native handle is still held
    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Input bytes consumed by the engine so far
    pub fn total_in(&self) -> u64 {
        self.handle.as_ref().map_or(0, NativeHandle::total_in)
    }

    /// Output bytes produced by the engine so far
    pub fn total_out(&self) -> u64 {
        self.handle.as_ref().map_or(0, NativeHandle::total_out)
    }

    /// Take one engine step, updating the session state.
    pub fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Step> {
        self.drive(|handle| handle.step(input, output, flush))
    }

    /// Take one engine step writing into the spare space of `output`
    pub fn step_buffer(&mut self, input: &[u8], output: &mut OutputBuffer, flush: Flush) -> Result<Step> {
        self.drive(|handle| handle.step_vec(input, output.storage_mut(), flush))
    }

    fn drive(&mut self, engine_step: impl FnOnce(&mut NativeHandle) -> Result<Step>) -> Result<Step> {
        match self.state {
            SessionState::Finished => return Err(CzlibError::InvalidState("session already finished")),
            SessionState::Errored => return Err(CzlibError::InvalidState("session failed earlier")),
            SessionState::Idle | SessionState::Active => {}
        }
        let handle = self
            .handle
            .as_mut()
            .ok_or(CzlibError::InvalidState("session destroyed"))?;

        match engine_step(handle) {
            Ok(step) => {
                self.state = if step.status == StepStatus::StreamEnd {
                    SessionState::Finished
                } else {
                    SessionState::Active
                };
                Ok(step)
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    /// Drive the session to the end of the stream over `input`.
    ///
    /// The initial capacity follows the one-shot policy for the session's
    /// direction.
    pub fn run(&mut self, input: &[u8]) -> Result<OutputBuffer> {
        let (initial, minimum) = one_shot_capacity(self.direction, input.len());
        let output = match OutputBuffer::with_capacity(initial, minimum) {
            Ok(output) => output,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        self.run_into(input, output)
    }

    /// Drive the session over `input` starting from an explicit capacity guess
    pub fn run_with_capacity(&mut self, input: &[u8], initial: usize) -> Result<OutputBuffer> {
        let output = match OutputBuffer::with_capacity(initial, 1) {
            Ok(output) => output,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        self.run_into(input, output)
    }

    fn run_into(&mut self, input: &[u8], mut output: OutputBuffer) -> Result<OutputBuffer> {
        // compression finishes in one pass; decompression ends on its own trailer
        let flush = match self.direction {
            Direction::Compress => Flush::Finish,
            Direction::Decompress => Flush::None,
        };
        let mut pos = 0;

        loop {
            let step = self.step_buffer(&input[pos..], &mut output, flush)?;
            pos += step.consumed;

            match step.status {
                StepStatus::StreamEnd => break,
                StepStatus::OutputFull => {
                    if let Err(e) = output.grow() {
                        self.fail();
                        return Err(e);
                    }
                }
                StepStatus::NeedMoreInput
                    if pos < input.len() && (step.consumed > 0 || step.produced > 0) => {}
                StepStatus::NeedMoreInput => {
                    self.fail();
                    return Err(match self.direction {
                        Direction::Decompress => CzlibError::TruncatedInput,
                        Direction::Compress => {
                            CzlibError::EncodeFailure("engine stalled before end of stream".into())
                        }
                    });
                }
            }
        }

        if pos < input.len() {
            log::debug!("ignoring {} bytes after end of stream", input.len() - pos);
        }
        log::debug!(
            "{:?} session finished: {} -> {} bytes, {} grows",
            self.direction,
            pos,
            output.len(),
            output.grow_count()
        );
        self.end();
        Ok(output)
    }

    /// Return to `Idle` with a fresh engine state and the same parameters
    pub fn reset(&mut self) -> Result<()> {
        match self.handle.as_mut() {
            Some(handle) => handle.reset(),
            None => {
                self.handle = Some(NativeHandle::init(
                    self.direction,
                    self.framing,
                    self.level,
                    self.window_bits,
                )?);
            }
        }
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Destroy the native handle. Further calls are no-ops.
    pub fn end(&mut self) {
        if self.handle.take().is_some() && self.state != SessionState::Finished {
            log::debug!("{:?} session abandoned in state {:?}", self.direction, self.state);
        }
    }

    fn fail(&mut self) {
        self.state = SessionState::Errored;
        self.handle = None;
    }
}

/// Initial output capacity and growth floor for a one-shot run
pub fn one_shot_capacity(direction: Direction, input_len: usize) -> (usize, usize) {
    match direction {
        Direction::Compress => (input_len.max(MIN_COMPRESS_CAPACITY), MIN_COMPRESS_CAPACITY),
        Direction::Decompress => (input_len.max(MIN_DECOMPRESS_CAPACITY), MIN_DECOMPRESS_CAPACITY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zlib_of(data: &[u8]) -> Vec<u8> {
        let mut session = Session::compressor(&CompressOptions::default()).unwrap();
        session.run(data).unwrap().into_managed()
    }

    #[test]
    fn test_state_transitions() {
        let mut session = Session::compressor(&CompressOptions::default()).unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        let mut out = [0u8; 128];
        session.step(b"abc", &mut out, Flush::None).unwrap();
        assert_eq!(session.state(), SessionState::Active);

        let step = session.step(&[], &mut out, Flush::Finish).unwrap();
        assert_eq!(step.status, StepStatus::StreamEnd);
        assert_eq!(session.state(), SessionState::Finished);

        assert!(matches!(
            session.step(&[], &mut out, Flush::Finish),
            Err(CzlibError::InvalidState(_))
        ));
    }

    #[test]
    fn test_error_destroys_handle() {
        let mut session = Session::decompressor(Framing::Zlib, 15).unwrap();
        assert!(session.is_live());

        let result = session.run(&[0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(CzlibError::CorruptStream(_))));
        assert_eq!(session.state(), SessionState::Errored);
        assert!(!session.is_live());
    }

    #[test]
    fn test_truncated_input() {
        let compressed = zlib_of(b"a sentence long enough to produce a few bytes of output");
        let mut session = Session::decompressor(Framing::Zlib, 15).unwrap();
        let result = session.run(&compressed[..compressed.len() - 2]);
        assert!(matches!(result, Err(CzlibError::TruncatedInput)));
        assert!(!session.is_live());
    }

    #[test]
    fn test_run_releases_handle_on_success() {
        let mut session = Session::compressor(&CompressOptions::default()).unwrap();
        let output = session.run(b"payload").unwrap();
        assert!(!output.is_empty());
        assert_eq!(session.state(), SessionState::Finished);
        assert!(!session.is_live());
    }

    #[test]
    fn test_growth_from_tiny_capacity() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let compressed = zlib_of(&data);

        let mut session = Session::decompressor(Framing::Zlib, 15).unwrap();
        let output = session.run_with_capacity(&compressed, 1).unwrap();
        assert_eq!(output.as_slice(), &data[..]);
        // 1 -> 2 -> ... -> 65536 covers 50_000 bytes
        assert_eq!(output.grow_count(), 16);
    }

    #[test]
    fn test_step_buffer_appends_produced_bytes() {
        let compressed = zlib_of(&[5u8; 4000]);
        let mut session = Session::decompressor(Framing::Zlib, 15).unwrap();
        let mut output = OutputBuffer::with_capacity(1000, 1).unwrap();

        let step = session.step_buffer(&compressed, &mut output, Flush::None).unwrap();
        assert_eq!(step.status, StepStatus::OutputFull);
        assert_eq!(output.len(), 1000);
        assert_eq!(output.spare(), 0);

        let mut pos = step.consumed;
        loop {
            output.grow().unwrap();
            let before = output.len();
            let step = session
                .step_buffer(&compressed[pos..], &mut output, Flush::None)
                .unwrap();
            pos += step.consumed;
            assert_eq!(output.len(), before + step.produced);
            if step.status == StepStatus::StreamEnd {
                break;
            }
            assert_eq!(step.status, StepStatus::OutputFull);
        }
        assert_eq!(output.as_slice(), &[5u8; 4000][..]);
    }

    #[test]
    fn test_reset_after_error() {
        let mut session = Session::decompressor(Framing::Zlib, 15).unwrap();
        assert!(session.run(b"not a stream").is_err());

        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        let compressed = zlib_of(b"again");
        assert_eq!(session.run(&compressed).unwrap().as_slice(), b"again");
    }

    #[test]
    fn test_one_shot_capacity() {
        assert_eq!(one_shot_capacity(Direction::Compress, 10), (4096, 4096));
        assert_eq!(one_shot_capacity(Direction::Compress, 10_000), (10_000, 4096));
        assert_eq!(one_shot_capacity(Direction::Decompress, 10), (65536, 65536));
        assert_eq!(one_shot_capacity(Direction::Decompress, 100_000), (100_000, 65536));
    }
}
