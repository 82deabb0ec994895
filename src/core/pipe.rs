//! Purpose: Bounded, blocking, thread-safe byte pipe over a fixed-capacity ring.
//! Exports: `BoundedPipe`, `PipeStats`.
//! Role: The shared primitive; producers block while full, consumers block while empty.
//! Invariants: Ring positions, counters, and the open flag change only under `state`'s lock.
//! Invariants: Open -> closed happens once; every waiter is woken when it does.
//! Invariants: Crossing the empty or full boundary broadcasts on `changed`.
//! Invariants: Each pipe owns its own lock and condvar; nothing is shared across instances.
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::core::error::Error;
use crate::core::ring::ByteRing;

#[derive(Debug)]
struct PipeState {
    ring: ByteRing,
    open: bool,
    total_written: u64,
    total_read: u64,
}

/// Point-in-time view of a pipe, captured under its lock.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PipeStats {
    pub capacity: usize,
    pub buffered: usize,
    pub open: bool,
    pub total_written: u64,
    pub total_read: u64,
}

/// A fixed-capacity byte pipe shared by any number of producer and consumer threads.
///
/// Share it through `Arc`. A short count from [`write`](Self::write) or
/// [`read`](Self::read) is the end-of-stream signal, not a failure.
#[derive(Debug)]
pub struct BoundedPipe {
    capacity: usize,
    state: Mutex<PipeState>,
    changed: Condvar,
}

impl BoundedPipe {
    /// Allocates a pipe holding at most `capacity` bytes.
    ///
    /// Fails with `ErrorKind::Allocation` when `capacity` is zero or the buffer
    /// cannot be allocated.
    pub fn create(capacity: usize) -> Result<Self, Error> {
        let ring = ByteRing::with_capacity(capacity)?;
        tracing::debug!(capacity, "pipe created");
        Ok(Self {
            capacity,
            state: Mutex::new(PipeState {
                ring,
                open: true,
                total_written: 0,
                total_read: 0,
            }),
            changed: Condvar::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().ring.is_full()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn stats(&self) -> PipeStats {
        let state = self.lock();
        PipeStats {
            capacity: self.capacity,
            buffered: state.ring.len(),
            open: state.open,
            total_written: state.total_written,
            total_read: state.total_read,
        }
    }

    /// Enqueues all of `data`, blocking while the pipe is full.
    ///
    /// Returns `data.len()` unless the pipe closes first; the shorter count is then
    /// the number of bytes stored before the close took effect. Writing to a closed
    /// pipe returns `0` without blocking.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut state = self.lock();
        let mut written = 0;
        while written < data.len() && state.open {
            if state.ring.is_full() {
                state = self.wait(state);
                continue;
            }
            let was_empty = state.ring.is_empty();
            let n = state.ring.push_slice(&data[written..]);
            written += n;
            state.total_written += n as u64;
            if was_empty {
                self.changed.notify_all();
            }
        }
        written
    }

    /// Fills `buf`, blocking while the pipe is empty and open.
    ///
    /// Once the pipe is closed this never blocks: it drains whatever is buffered, up
    /// to `buf.len()`. A close that arrives while blocked ends the call with the bytes
    /// read so far; later calls drain the rest.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut state = self.lock();
        if !state.open {
            return self.take(&mut state, buf);
        }
        let mut read = 0;
        while read < buf.len() && state.open {
            if state.ring.is_empty() {
                state = self.wait(state);
                continue;
            }
            read += self.take(&mut state, &mut buf[read..]);
        }
        read
    }

    /// Reads whatever is buffered, up to `buf.len()`, blocking only while the pipe
    /// is empty and open.
    ///
    /// Returns `0` for a non-empty `buf` only when the pipe is closed and drained.
    pub fn read_some(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let mut state = self.lock();
        while state.ring.is_empty() && state.open {
            state = self.wait(state);
        }
        self.take(&mut state, buf)
    }

    /// Marks the pipe closed and wakes every blocked reader and writer.
    ///
    /// Repeated calls have no further effect.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.open {
            return;
        }
        state.open = false;
        tracing::debug!(
            capacity = self.capacity,
            buffered = state.ring.len(),
            "pipe closed"
        );
        self.changed.notify_all();
    }

    /// Releases the buffer and synchronization state.
    ///
    /// Taking `self` by value means no other thread can still hold the pipe; when it
    /// is shared through `Arc`, unwrap the last handle (or drop it) after joining
    /// every user.
    pub fn destroy(self) {
        tracing::trace!(capacity = self.capacity, "pipe destroyed");
    }

    fn take(&self, state: &mut PipeState, buf: &mut [u8]) -> usize {
        let was_full = state.ring.is_full();
        let n = state.ring.pop_into(buf);
        state.total_read += n as u64;
        if was_full && n > 0 {
            self.changed.notify_all();
        }
        n
    }

    // The ring is consistent at every point a holder could panic, so a poisoned
    // lock still guards valid state.
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, PipeState>) -> MutexGuard<'a, PipeState> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}
