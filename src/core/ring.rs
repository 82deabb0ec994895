// Fixed-capacity circular byte storage; callers serialize access (see `core::pipe`).
use crate::core::error::{Error, ErrorKind};

/// Byte ring with independently wrapping write (`head`) and read (`tail`) positions.
///
/// `len` disambiguates the `head == tail` case: empty when `len == 0`, full when
/// `len == capacity`.
#[derive(Debug)]
pub(crate) struct ByteRing {
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl ByteRing {
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::new(ErrorKind::Allocation)
                .with_message("capacity must be positive")
                .with_capacity(capacity));
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity).map_err(|err| {
            Error::new(ErrorKind::Allocation)
                .with_message("failed to allocate ring buffer")
                .with_capacity(capacity)
                .with_source(err)
        })?;
        buf.resize(capacity, 0);
        Ok(Self {
            buf: buf.into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn free(&self) -> usize {
        self.capacity() - self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends as many leading bytes of `data` as fit; returns how many were stored.
    pub(crate) fn push_slice(&mut self, data: &[u8]) -> usize {
        let cap = self.capacity();
        let n = data.len().min(self.free());
        if n == 0 {
            return 0;
        }
        let first = n.min(cap - self.head);
        self.buf[self.head..self.head + first].copy_from_slice(&data[..first]);
        self.buf[..n - first].copy_from_slice(&data[first..n]);
        self.head = (self.head + n) % cap;
        self.len += n;
        n
    }

    /// Moves up to `out.len()` of the oldest bytes into `out`; returns how many were moved.
    pub(crate) fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let cap = self.capacity();
        let n = out.len().min(self.len);
        if n == 0 {
            return 0;
        }
        let first = n.min(cap - self.tail);
        out[..first].copy_from_slice(&self.buf[self.tail..self.tail + first]);
        out[first..n].copy_from_slice(&self.buf[..n - first]);
        self.tail = (self.tail + n) % cap;
        self.len -= n;
        n
    }

    #[cfg(test)]
    fn positions_agree(&self) -> bool {
        let cap = self.capacity();
        let span = (self.head + cap - self.tail) % cap;
        span == self.len % cap
    }
}
