// Stress harness: many producers and consumers on one pipe, then verify what arrived.
//
// Each producer tags its bytes as `producer << 4 | seq & 0x0f`, so consumers can attribute
// every byte and, with a single consumer, check that each producer's bytes stayed in order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Instant, SystemTime};

use serde::Serialize;

use ringpipe::api::{BoundedPipe, Error, ErrorKind, PipeStats};

pub const MAX_PRODUCERS: usize = 16;

#[derive(Clone, Debug, Serialize)]
pub struct StressConfig {
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub bytes: u64,
    pub chunk: usize,
}

#[derive(Debug, Serialize)]
pub struct StressReport {
    pub name: &'static str,
    pub version: &'static str,
    pub ts: String,
    pub params: StressConfig,
    pub produced: Vec<u64>,
    pub consumed: Vec<u64>,
    pub in_order: Option<bool>,
    pub elapsed_ms: u64,
    pub pipe: PipeStats,
    pub ok: bool,
}

#[derive(Debug)]
struct ConsumerTally {
    counts: [u64; MAX_PRODUCERS],
    in_order: bool,
}

fn tag(producer: usize, seq: u64) -> u8 {
    ((producer as u8) << 4) | (seq & 0x0f) as u8
}

pub fn validate(config: &StressConfig) -> Result<(), Error> {
    if config.producers == 0 || config.producers > MAX_PRODUCERS {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("--producers must be between 1 and {MAX_PRODUCERS}")));
    }
    if config.consumers == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message("--consumers must be positive"));
    }
    if config.chunk == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message("--chunk must be positive"));
    }
    Ok(())
}

pub fn run_stress(config: StressConfig, program_version: &'static str) -> Result<StressReport, Error> {
    validate(&config)?;
    let pipe = Arc::new(BoundedPipe::create(config.capacity)?);
    let started_at = SystemTime::now();
    let start = Instant::now();

    let consumers: Vec<JoinHandle<ConsumerTally>> = (0..config.consumers)
        .map(|_| {
            let pipe = Arc::clone(&pipe);
            let chunk = config.chunk;
            thread::spawn(move || consume(&pipe, chunk))
        })
        .collect();

    let producers: Vec<JoinHandle<u64>> = (0..config.producers)
        .map(|producer| {
            let pipe = Arc::clone(&pipe);
            let (bytes, chunk) = (config.bytes, config.chunk);
            thread::spawn(move || produce(&pipe, producer, bytes, chunk))
        })
        .collect();

    let mut produced = Vec::with_capacity(config.producers);
    for handle in producers {
        produced.push(join_or_close(&pipe, handle, "producer")?);
    }
    pipe.close();

    let mut consumed = vec![0u64; config.producers];
    let mut in_order = true;
    for handle in consumers {
        let tally = join_or_close(&pipe, handle, "consumer")?;
        for (total, count) in consumed.iter_mut().zip(tally.counts.iter()) {
            *total += count;
        }
        in_order &= tally.in_order;
    }
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let stats = pipe.stats();
    let in_order = (config.consumers == 1).then_some(in_order);
    let ok = produced == consumed
        && stats.total_written == stats.total_read
        && stats.buffered == 0
        && in_order.unwrap_or(true);
    tracing::debug!(ok, elapsed_ms, "stress finished");

    Ok(StressReport {
        name: "ringpipe",
        version: program_version,
        ts: rfc3339(started_at),
        params: config,
        produced,
        consumed,
        in_order,
        elapsed_ms,
        pipe: stats,
        ok,
    })
}

fn produce(pipe: &BoundedPipe, producer: usize, bytes: u64, chunk: usize) -> u64 {
    let mut buf = Vec::with_capacity(chunk);
    let mut seq = 0u64;
    let mut written = 0u64;
    while seq < bytes {
        buf.clear();
        let take = (bytes - seq).min(chunk as u64);
        buf.extend((seq..seq + take).map(|s| tag(producer, s)));
        seq += take;
        let n = pipe.write(&buf);
        written += n as u64;
        if n < buf.len() {
            break;
        }
    }
    written
}

fn consume(pipe: &BoundedPipe, chunk: usize) -> ConsumerTally {
    let mut tally = ConsumerTally {
        counts: [0; MAX_PRODUCERS],
        in_order: true,
    };
    let mut next_seq = [0u8; MAX_PRODUCERS];
    let mut buf = vec![0u8; chunk];
    loop {
        let n = pipe.read(&mut buf);
        for byte in &buf[..n] {
            let producer = usize::from(byte >> 4);
            let seq = byte & 0x0f;
            if seq != next_seq[producer] {
                tally.in_order = false;
            }
            next_seq[producer] = (seq + 1) & 0x0f;
            tally.counts[producer] += 1;
        }
        if n < buf.len() {
            let stats = pipe.stats();
            if !stats.open && stats.buffered == 0 {
                break;
            }
        }
    }
    tally
}

// A panicked worker must not leave its peers blocked on a pipe nobody will close.
fn join_or_close<T>(pipe: &BoundedPipe, handle: JoinHandle<T>, role: &str) -> Result<T, Error> {
    handle.join().map_err(|_| {
        pipe.close();
        Error::new(ErrorKind::Internal).with_message(format!("{role} thread panicked"))
    })
}

fn rfc3339(at: SystemTime) -> String {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::from(at)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
