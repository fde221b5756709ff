//! Fixed-capacity byte ring shared by the receive and transmit paths.

/// Capacity of the receive ring.
pub const RX_BUFFER_SIZE: usize = 65535;

/// Capacity of the transmit ring.
pub const TX_BUFFER_SIZE: usize = 65535;

/// Circular byte store with one slot kept free.
///
/// `head == tail` means empty and `tail + 1 == head` means full, so a ring of
/// capacity `C` holds at most `C - 1` bytes.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring capacity must be at least 2");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently stored.
    pub fn len(&self) -> usize {
        (self.tail + self.capacity() - self.head) % self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Bytes that can still be pushed.
    pub fn free_space(&self) -> usize {
        self.capacity() - 1 - self.len()
    }

    /// Append as much of `data` as fits; returns the count written.
    pub fn push_slice(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.free_space());
        let cap = self.capacity();
        let first = count.min(cap - self.tail);
        self.buf[self.tail..self.tail + first].copy_from_slice(&data[..first]);
        self.buf[..count - first].copy_from_slice(&data[first..count]);
        self.tail = (self.tail + count) % cap;
        count
    }

    /// Byte at `offset` past the read cursor. `offset` must be below `len()`.
    pub fn peek(&self, offset: usize) -> u8 {
        debug_assert!(offset < self.len());
        self.buf[(self.head + offset) % self.capacity()]
    }

    /// Little-endian u16 at `offset` past the read cursor.
    pub fn peek_u16_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.peek(offset), self.peek(offset + 1)])
    }

    /// Copy `dst.len()` bytes starting `offset` past the read cursor.
    pub fn copy_out(&self, offset: usize, dst: &mut [u8]) {
        debug_assert!(offset + dst.len() <= self.len());
        let cap = self.capacity();
        let start = (self.head + offset) % cap;
        let first = dst.len().min(cap - start);
        dst[..first].copy_from_slice(&self.buf[start..start + first]);
        let rest = dst.len() - first;
        dst[first..].copy_from_slice(&self.buf[..rest]);
    }

    /// Move the read cursor forward by `count` bytes (clamped to `len()`).
    pub fn advance(&mut self, count: usize) {
        let count = count.min(self.len());
        self.head = (self.head + count) % self.capacity();
    }

    /// Move the read cursor back by `count` bytes.
    pub fn rewind(&mut self, count: usize) {
        let count = count.min(self.free_space());
        self.head = (self.head + self.capacity() - count) % self.capacity();
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}
