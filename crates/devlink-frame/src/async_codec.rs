//! `tokio_util` codec for devlink frames.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_frame, encode_frame, Frame, HEADER, MAX_FRAME_SIZE, MIN_FRAME_SIZE};
use crate::error::FrameError;

/// Frames a byte stream with the same resync rules as
/// [`RxFrameExtractor`](crate::rx::RxFrameExtractor).
///
/// Candidates that fail validation are logged and skipped; they never end the
/// stream.
#[derive(Debug, Default)]
pub struct DeviceLinkCodec {
    discarded: u64,
}

impl DeviceLinkCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes skipped while hunting for a header.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Decoder for DeviceLinkCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            if src.len() < MIN_FRAME_SIZE {
                return Ok(None);
            }

            if src[0..2] != HEADER {
                src.advance(1);
                self.discarded += 1;
                continue;
            }

            let size = 6 + usize::from(u16::from_le_bytes([src[2], src[3]]));
            if size > MAX_FRAME_SIZE {
                src.advance(1);
                self.discarded += 1;
                continue;
            }
            if src.len() < size {
                src.reserve(size - src.len());
                return Ok(None);
            }

            let candidate = src.split_to(size);
            match decode_frame(&candidate) {
                Ok(frame) => return Ok(Some(frame)),
                Err(err) => warn!(error = %err, len = size, "dropping invalid frame"),
            }
        }
    }
}

impl Encoder<Frame> for DeviceLinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(item.command, item.seq, &item.payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;

    #[test]
    fn encode_then_decode() {
        let mut codec = DeviceLinkCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(0x12, 4, &b"go"[..]), &mut buf)
            .unwrap();

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((frame.command, frame.seq), (0x12, 4));
        assert_eq!(frame.payload.as_ref(), b"go");
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_frame_waits() {
        let mut codec = DeviceLinkCodec::new();
        let mut full = BytesMut::new();
        encode_frame(0x01, 0, b"abc", &mut full).unwrap();

        let mut buf = BytesMut::from(&full[..7]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 7);
    }

    #[tokio::test]
    async fn stream_skips_garbage_and_corruption() {
        let mut wire = vec![0x00, 0xAA, 0x55, 0xFF, 0xFF];
        let mut good = BytesMut::new();
        encode_frame(0x01, 1, b"", &mut good).unwrap();
        let mut bad = good.clone();
        bad[4] ^= 0x01;
        wire.extend_from_slice(&bad);
        encode_frame(0x02, 2, b"", &mut good).unwrap();
        wire.extend_from_slice(&good);

        let frames: Vec<Frame> = FramedRead::new(&wire[..], DeviceLinkCodec::new())
            .map(|res| res.unwrap())
            .collect()
            .await;

        let seqs: Vec<u8> = frames.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }
}
