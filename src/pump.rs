// Copies a byte stream through a bounded pipe: one producer thread, the caller consumes.
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use ringpipe::api::{BoundedPipe, Error, ErrorKind, PipeStats};

#[derive(Clone, Debug)]
pub struct PumpConfig {
    pub capacity: usize,
    pub chunk: usize,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

pub fn run_pump(config: &PumpConfig) -> Result<PipeStats, Error> {
    if config.chunk == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message("--chunk must be positive"));
    }

    let input: Box<dyn Read + Send> = match &config.input {
        Some(path) => Box::new(File::open(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to open input {}", path.display()))
                .with_source(err)
        })?),
        None => Box::new(io::stdin()),
    };
    let output: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(File::create(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to create output {}", path.display()))
                .with_source(err)
        })?),
        None => Box::new(io::stdout().lock()),
    };

    pump(input, output, config.capacity, config.chunk)
}

pub fn pump<R, W>(mut input: R, mut output: W, capacity: usize, chunk: usize) -> Result<PipeStats, Error>
where
    R: Read + Send + 'static,
    W: Write,
{
    let pipe = Arc::new(BoundedPipe::create(capacity)?);
    tracing::debug!(capacity, chunk, "pump started");

    let producer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || -> io::Result<u64> {
            let _close = CloseOnDrop(&pipe);
            let mut buf = vec![0u8; chunk];
            let mut total = 0u64;
            loop {
                let n = match input.read(&mut buf) {
                    Ok(0) => break Ok(total),
                    Ok(n) => n,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => break Err(err),
                };
                let written = pipe.write(&buf[..n]);
                total += written as u64;
                if written < n {
                    // consumer side closed the pipe
                    break Ok(total);
                }
            }
        })
    };

    let consumed = drain_into(&pipe, &mut output, chunk);
    if consumed.is_err() {
        pipe.close();
    }

    let produced = producer.join().map_err(|_| {
        Error::new(ErrorKind::Internal).with_message("producer thread panicked")
    })?;
    consumed.map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write output")
            .with_source(err)
    })?;
    produced.map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read input")
            .with_source(err)
    })?;

    let stats = pipe.stats();
    tracing::debug!(bytes = stats.total_read, "pump finished");
    Ok(stats)
}

// Forwards each chunk as soon as it is buffered so interactive input is not held back.
fn drain_into<W: Write>(pipe: &BoundedPipe, output: &mut W, chunk: usize) -> io::Result<()> {
    let mut buf = vec![0u8; chunk];
    loop {
        let n = pipe.read_some(&mut buf);
        if n == 0 {
            return Ok(());
        }
        output.write_all(&buf[..n])?;
        output.flush()?;
    }
}

// Closes the pipe however the producer exits, including by panic.
struct CloseOnDrop<'a>(&'a BoundedPipe);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}
