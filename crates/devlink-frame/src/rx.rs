use bytes::Bytes;
use tracing::{debug, trace};

use crate::codec::{HEADER, MAX_FRAME_SIZE, MIN_FRAME_SIZE};
use crate::ring::{RingBuffer, RX_BUFFER_SIZE};

/// Recovers candidate frames from an unstructured inbound byte stream.
///
/// Bytes are buffered in a fixed ring. Extraction scans from the oldest byte:
/// a header with a plausible length yields a candidate once all of its bytes
/// have arrived, anything else is dropped one byte at a time until the stream
/// lines up on a header again. Candidates are not validated here; pass them to
/// [`decode_frame`](crate::codec::decode_frame).
#[derive(Debug)]
pub struct RxFrameExtractor {
    ring: RingBuffer,
    discarded: u64,
}

impl Default for RxFrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RxFrameExtractor {
    pub fn new() -> Self {
        Self::with_capacity(RX_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::with_capacity(capacity),
            discarded: 0,
        }
    }

    /// Buffer inbound bytes. Returns how many were accepted; the rest did not
    /// fit and are lost.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        let accepted = self.ring.push_slice(data);
        if accepted < data.len() {
            debug!(
                accepted,
                dropped = data.len() - accepted,
                "rx buffer full, dropping bytes"
            );
        }
        accepted
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// Room left for [`feed`](Self::feed).
    pub fn free_space(&self) -> usize {
        self.ring.free_space()
    }

    /// Bytes skipped while hunting for a header.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Take the next complete candidate frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            let available = self.ring.len();
            if available < MIN_FRAME_SIZE {
                return None;
            }

            if self.ring.peek(0) != HEADER[0] || self.ring.peek(1) != HEADER[1] {
                self.skip_byte();
                continue;
            }

            let size = 6 + usize::from(self.ring.peek_u16_le(2));
            if size > MAX_FRAME_SIZE {
                trace!(size, "declared frame too large, resyncing");
                self.skip_byte();
                continue;
            }
            if size > available {
                return None;
            }

            let mut frame = vec![0u8; size];
            self.ring.copy_out(0, &mut frame);
            self.ring.advance(size);
            return Some(Bytes::from(frame));
        }
    }

    /// Iterate over every complete candidate currently buffered.
    pub fn extract_frames(&mut self) -> Frames<'_> {
        Frames { extractor: self }
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    fn skip_byte(&mut self) {
        self.ring.advance(1);
        self.discarded += 1;
    }
}

/// Iterator returned by [`RxFrameExtractor::extract_frames`].
pub struct Frames<'a> {
    extractor: &'a mut RxFrameExtractor,
}

impl Iterator for Frames<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.extractor.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_frame, encode_frame};

    fn encoded(command: u8, seq: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(command, seq, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn extracts_single_frame() {
        let wire = encoded(0x01, 7, b"");
        let mut rx = RxFrameExtractor::new();
        assert_eq!(rx.feed(&wire), wire.len());

        let frames: Vec<_> = rx.extract_frames().collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &wire[..]);
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn skips_leading_garbage() {
        let mut wire = vec![0x00, 0x13, 0xAA, 0x37];
        wire.extend(encoded(0x02, 1, b""));

        let mut rx = RxFrameExtractor::new();
        rx.feed(&wire);
        let frame = rx.next_frame().unwrap();
        assert_eq!(decode_frame(&frame).unwrap().command, 0x02);
        assert_eq!(rx.discarded(), 4);
    }

    #[test]
    fn partial_frame_waits_for_rest() {
        let wire = encoded(0x14, 3, &[1, 2, 3, 4, 5, 6]);
        let (first, rest) = wire.split_at(9);

        let mut rx = RxFrameExtractor::new();
        rx.feed(first);
        assert!(rx.next_frame().is_none());
        assert_eq!(rx.buffered(), 9);

        rx.feed(rest);
        let frame = rx.next_frame().unwrap();
        assert_eq!(decode_frame(&frame).unwrap().payload.as_ref(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn oversized_length_resyncs() {
        // Header claiming 0xFFFF bytes, then a real frame.
        let mut wire = vec![0xAA, 0x55, 0xFF, 0xFF, 0x00, 0x00];
        wire.extend(encoded(0x01, 9, b""));

        let mut rx = RxFrameExtractor::new();
        rx.feed(&wire);
        let frame = rx.next_frame().unwrap();
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!((decoded.command, decoded.seq), (0x01, 9));
        assert_eq!(rx.discarded(), 6);
    }

    #[test]
    fn multiple_frames_in_one_feed() {
        let mut wire = Vec::new();
        for seq in 0..5u8 {
            wire.extend(encoded(0x01, seq, &[seq; 3]));
        }

        let mut rx = RxFrameExtractor::new();
        rx.feed(&wire);
        let seqs: Vec<u8> = rx
            .extract_frames()
            .map(|f| decode_frame(&f).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn capacity_reserves_one_byte() {
        let mut rx = RxFrameExtractor::new();
        let data = vec![0u8; RX_BUFFER_SIZE];
        assert_eq!(rx.feed(&data), RX_BUFFER_SIZE - 1);
        assert_eq!(rx.free_space(), 0);
    }

    #[test]
    fn frames_survive_ring_wraparound() {
        let mut rx = RxFrameExtractor::with_capacity(64);
        for seq in 0..20u8 {
            let wire = encoded(0x03, seq, &[0x5A; 10]);
            assert_eq!(rx.feed(&wire), wire.len());
            let frame = rx.next_frame().unwrap();
            assert_eq!(decode_frame(&frame).unwrap().seq, seq);
        }
        assert_eq!(rx.discarded(), 0);
    }

    #[test]
    fn corrupted_candidate_is_still_extracted() {
        let mut wire = encoded(0x01, 0, b"xy");
        wire[6] ^= 0xFF;

        let mut rx = RxFrameExtractor::new();
        rx.feed(&wire);
        let frame = rx.next_frame().unwrap();
        assert!(decode_frame(&frame).is_err());
    }
}
