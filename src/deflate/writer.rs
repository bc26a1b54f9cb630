//! DeflateWriter - Streaming compression writer
//!
//! Each write feeds its chunk through a long-lived compression session and
//! drains whatever the engine produced straight to the sink. The only
//! buffering is a single engine window; bytes produced but not yet accepted
//! by the sink stay there until the next write, flush or close.

use crate::common::{Direction, StreamOptions};
use crate::native::{Flush, StepStatus};
use crate::session::{Session, SessionState};
use crate::{CzlibError, Result};
use std::io::{self, Write};

/// Streaming compression writer implementing Write trait
#[derive(Debug)]
pub struct DeflateWriter<W: Write> {
    writer: Option<W>,
    session: Session,
    window: Vec<u8>,
    pending_start: usize,
    pending_end: usize,
    closed: bool,
}

impl<W: Write> DeflateWriter<W> {
    /// Create a zlib writer at the default level
    pub fn new(writer: W) -> Result<Self> {
        Self::with_options(writer, StreamOptions::default())
    }

    /// Create a writer with explicit framing, level and window size
    pub fn with_options(writer: W, options: StreamOptions) -> Result<Self> {
        let session = Session::new(
            Direction::Compress,
            options.framing,
            options.level,
            options.window_bits,
        )?;
        Ok(Self {
            writer: Some(writer),
            session,
            window: vec![0; options.effective_buffer_size()],
            pending_start: 0,
            pending_end: 0,
            closed: false,
        })
    }

    /// Reference to the underlying sink
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    /// Uncompressed bytes accepted so far
    pub fn total_in(&self) -> u64 {
        self.session.total_in()
    }

    /// Compressed bytes produced so far
    pub fn total_out(&self) -> u64 {
        self.session.total_out()
    }

    /// Whether `close` has completed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Compress `chunk`, draining output to the sink after every step.
    ///
    /// Returns how many bytes of `chunk` the engine consumed. If the sink
    /// fails after some bytes were consumed, the count so far is returned
    /// and the undrained output is kept for the next call; the error
    /// surfaces then.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(CzlibError::InvalidState("writer already closed"));
        }
        self.drain_pending()?;

        let mut consumed = 0;
        while consumed < chunk.len() {
            let step = self
                .session
                .step(&chunk[consumed..], &mut self.window, Flush::None)?;
            if step.consumed == 0 && step.produced == 0 {
                return Err(CzlibError::EncodeFailure(
                    "engine made no progress on pending input".into(),
                ));
            }
            consumed += step.consumed;
            self.pending_start = 0;
            self.pending_end = step.produced;

            if let Err(e) = self.drain_pending() {
                if consumed > 0 {
                    log::debug!("sink failed after {} bytes consumed: {}", consumed, e);
                    return Ok(consumed);
                }
                return Err(e);
            }
        }

        Ok(consumed)
    }

    /// Finalize the stream: write the trailer, drain, and destroy the session.
    ///
    /// Calling `close` again after it succeeded is a no-op. After a sink
    /// failure it may be retried and resumes where it stopped.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.drain_pending()?;

        if self.session.state() != SessionState::Finished {
            loop {
                let step = self.session.step(&[], &mut self.window, Flush::Finish)?;
                self.pending_start = 0;
                self.pending_end = step.produced;
                self.drain_pending()?;
                if step.status == StepStatus::StreamEnd {
                    break;
                }
            }
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(CzlibError::Sink)?;
        }
        log::debug!(
            "writer closed: {} -> {} bytes",
            self.session.total_in(),
            self.session.total_out()
        );
        self.session.end();
        self.closed = true;
        Ok(())
    }

    /// Close the stream and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.writer
            .take()
            .ok_or(CzlibError::InvalidState("sink already taken"))
    }

    /// Close the current stream, then start a new one into `writer` with the
    /// same parameters. Returns the previous sink.
    pub fn reset(&mut self, writer: W) -> Result<W> {
        self.close()?;
        let previous = self
            .writer
            .replace(writer)
            .ok_or(CzlibError::InvalidState("sink already taken"))?;
        self.session.reset()?;
        self.pending_start = 0;
        self.pending_end = 0;
        self.closed = false;
        Ok(previous)
    }

    /// Write undrained window bytes to the sink
    fn drain_pending(&mut self) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(CzlibError::InvalidState("sink already taken"))?;

        while self.pending_start < self.pending_end {
            match writer.write(&self.window[self.pending_start..self.pending_end]) {
                Ok(0) => {
                    return Err(CzlibError::Sink(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "sink accepted no bytes",
                    )))
                }
                Ok(n) => self.pending_start += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(CzlibError::Sink(e)),
            }
        }
        Ok(())
    }
}

impl<W: Write> Write for DeflateWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_chunk(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.drain_pending()?;

        loop {
            let step = self.session.step(&[], &mut self.window, Flush::Sync)?;
            self.pending_start = 0;
            self.pending_end = step.produced;
            self.drain_pending()?;
            if step.status != StepStatus::OutputFull {
                break;
            }
        }

        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for DeflateWriter<W> {
    fn drop(&mut self) {
        if !self.closed && self.writer.is_some() {
            // Try to finish the stream, but ignore errors in drop
            if let Err(e) = self.close() {
                log::warn!("DeflateWriter dropped without close; finishing failed: {}", e);
            }
        }
    }
}
