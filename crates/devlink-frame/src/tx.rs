use bytes::Bytes;
use tracing::error;

use crate::ring::{RingBuffer, TX_BUFFER_SIZE};

const RECORD_PREFIX: usize = 2;

/// FIFO of encoded outbound frames awaiting a transport.
///
/// Each frame is stored as a `[u16 LE length][frame bytes]` record so the
/// drain side hands out whole frames.
#[derive(Debug)]
pub struct TxFrameQueue {
    ring: RingBuffer,
    queued: usize,
}

impl Default for TxFrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TxFrameQueue {
    pub fn new() -> Self {
        Self::with_capacity(TX_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::with_capacity(capacity),
            queued: 0,
        }
    }

    /// Store one frame. Returns `false`, storing nothing, if the record does
    /// not fit.
    pub fn enqueue(&mut self, frame: &[u8]) -> bool {
        let Ok(len) = u16::try_from(frame.len()) else {
            return false;
        };
        if frame.len() + RECORD_PREFIX > self.ring.free_space() {
            return false;
        }
        self.ring.push_slice(&len.to_le_bytes());
        self.ring.push_slice(frame);
        self.queued += 1;
        true
    }

    /// Take the oldest frame, cut to at most `max_out` bytes.
    ///
    /// A truncated frame is still removed whole. Returns empty when nothing
    /// is queued.
    pub fn dequeue(&mut self, max_out: usize) -> Bytes {
        if self.ring.len() < RECORD_PREFIX {
            return Bytes::new();
        }

        let len = usize::from(self.ring.peek_u16_le(0));
        self.ring.advance(RECORD_PREFIX);
        if len > self.ring.len() {
            error!(
                declared = len,
                buffered = self.ring.len(),
                "tx record longer than buffered data"
            );
            self.ring.rewind(RECORD_PREFIX);
            return Bytes::new();
        }

        let mut out = vec![0u8; len.min(max_out)];
        self.ring.copy_out(0, &mut out);
        self.ring.advance(len);
        self.queued = self.queued.saturating_sub(1);
        Bytes::from(out)
    }

    /// Frames waiting to be drained.
    pub fn queued_frames(&self) -> usize {
        self.queued
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Room left, counting the length prefix a new record needs.
    pub fn free_space(&self) -> usize {
        self.ring.free_space()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.queued = 0;
    }

    #[cfg(test)]
    fn raw_push(&mut self, data: &[u8]) {
        self.ring.push_slice(data);
    }
}
