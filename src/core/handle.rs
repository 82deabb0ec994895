//! Purpose: `std::io` adapters over a shared `BoundedPipe`.
//! Exports: `channel`, `PipeWriter`, `PipeReader`.
//! Role: Lets byte-stream code (`io::copy`, `BufReader`, ...) drive the pipe.
//! Invariants: Dropping either end closes the pipe so the peer cannot block forever.
//! Invariants: `PipeReader` yields `Ok(0)` only once the pipe is closed and drained.
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::pipe::BoundedPipe;

/// Creates a pipe of `capacity` bytes and returns its two stream ends.
pub fn channel(capacity: usize) -> Result<(PipeWriter, PipeReader), Error> {
    let pipe = Arc::new(BoundedPipe::create(capacity)?);
    Ok((
        PipeWriter {
            pipe: Arc::clone(&pipe),
        },
        PipeReader { pipe },
    ))
}

#[derive(Debug)]
pub struct PipeWriter {
    pipe: Arc<BoundedPipe>,
}

impl PipeWriter {
    pub fn pipe(&self) -> &Arc<BoundedPipe> {
        &self.pipe
    }

    pub fn close(&self) {
        self.pipe.close();
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.pipe.write(buf) {
            0 => Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe is closed")),
            n => Ok(n),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.pipe.close();
    }
}

#[derive(Debug)]
pub struct PipeReader {
    pipe: Arc<BoundedPipe>,
}

impl PipeReader {
    pub fn pipe(&self) -> &Arc<BoundedPipe> {
        &self.pipe
    }

    pub fn close(&self) {
        self.pipe.close();
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.pipe.read_some(buf))
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.pipe.close();
    }
}
