//! In-memory duplex stream.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};

/// Serves fed bytes to reads and records writes.
///
/// When no input is queued a read fails with `WouldBlock`, or returns 0
/// once [`MockStream::close_input`] has been called.
#[derive(Debug, Default)]
pub struct MockStream {
    input: VecDeque<u8>,
    output: Vec<u8>,
    read_chunk: Option<usize>,
    eof: bool,
    broken: bool,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit every read to at most `n` bytes.
    pub fn with_read_chunk(mut self, n: usize) -> Self {
        self.read_chunk = Some(n);
        self
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Reads return end-of-stream once the queued input is drained.
    pub fn close_input(&mut self) {
        self.eof = true;
    }

    /// Make every later write fail with `BrokenPipe`.
    pub fn break_pipe(&mut self) {
        self.broken = true;
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn written(&self) -> &[u8] {
        &self.output
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.input.is_empty() {
            return if self.eof {
                Ok(0)
            } else {
                Err(ErrorKind::WouldBlock.into())
            };
        }
        let limit = self.read_chunk.unwrap_or(usize::MAX);
        let n = buf.len().min(limit).min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken {
            return Err(ErrorKind::BrokenPipe.into());
        }
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
