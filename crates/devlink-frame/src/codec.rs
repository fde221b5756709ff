use bytes::{BufMut, Bytes, BytesMut};

use crate::command::CommandId;
use crate::error::{FrameError, Result};

/// Frame header bytes.
pub const HEADER: [u8; 2] = [0xAA, 0x55];

/// Frame trailer bytes.
pub const TRAILER: [u8; 2] = [0x55, 0xAA];

/// Largest frame, header to trailer, that either side will accept.
pub const MAX_FRAME_SIZE: usize = 8192;

/// Below this a byte run cannot be a frame at all.
pub const MIN_FRAME_SIZE: usize = 8;

/// Header (2) + length (2) + command (1) + seq (1) + CRC (2) + trailer (2).
pub const FRAME_OVERHEAD: usize = 10;

/// Largest payload that fits in [`MAX_FRAME_SIZE`].
pub const MAX_PAYLOAD: usize = MAX_FRAME_SIZE - FRAME_OVERHEAD;

/// CRC accumulator seed used for every frame.
pub const CRC_INIT: u16 = 0xFFFF;

/// Length field counts command, seq and CRC on top of the payload.
const LENGTH_FIELD_EXTRA: usize = 4;

/// Bytes outside the length field: header, length itself and trailer.
const LENGTH_FIELD_OUTSIDE: usize = 6;

/// CRC-16/MODBUS: reflected polynomial 0xA001, no final XOR.
///
/// `init` is the running accumulator, so a CRC over concatenated slices can be
/// computed by feeding each result into the next call.
pub fn crc16(data: &[u8], init: u16) -> u16 {
    let mut crc = init;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn frame_crc(command: u8, seq: u8, payload: &[u8]) -> u16 {
    crc16(payload, crc16(&[command, seq], CRC_INIT))
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command id. Unassigned ids are kept so they can be answered.
    pub command: u8,
    /// Correlation token; responses echo the request's value.
    pub seq: u8,
    /// Command-specific content.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(command: u8, seq: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            seq,
            payload: payload.into(),
        }
    }

    /// The command as a known id, if it is one.
    pub fn command_id(&self) -> Option<CommandId> {
        CommandId::try_from(self.command).ok()
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

fn check_payload(payload: &[u8]) -> Result<()> {
    if FRAME_OVERHEAD + payload.len() > MAX_FRAME_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

/// Encode a frame, appending it to `dst`.
///
/// Wire format:
/// ```text
/// ┌─────────┬──────────┬─────┬─────┬─────────┬──────────┬─────────┐
/// │ AA 55   │ Length   │ Cmd │ Seq │ Payload │ CRC16    │ 55 AA   │
/// │         │ (2B LE)  │ 1B  │ 1B  │ N bytes │ (2B LE)  │         │
/// └─────────┴──────────┴─────┴─────┴─────────┴──────────┴─────────┘
///             Length = N + 4; CRC covers Cmd, Seq and Payload.
/// ```
pub fn encode_frame(command: u8, seq: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    check_payload(payload)?;
    let length_field = (payload.len() + LENGTH_FIELD_EXTRA) as u16;

    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_slice(&HEADER);
    dst.put_u16_le(length_field);
    dst.put_u8(command);
    dst.put_u8(seq);
    dst.put_slice(payload);
    dst.put_u16_le(frame_crc(command, seq, payload));
    dst.put_slice(&TRAILER);
    Ok(())
}

/// Encode a frame into a fixed buffer, returning the number of bytes written.
pub fn encode_frame_into(command: u8, seq: u8, payload: &[u8], dst: &mut [u8]) -> Result<usize> {
    check_payload(payload)?;
    let total = FRAME_OVERHEAD + payload.len();
    if total > dst.len() {
        return Err(FrameError::BufferTooSmall {
            needed: total,
            available: dst.len(),
        });
    }

    let length_field = (payload.len() + LENGTH_FIELD_EXTRA) as u16;
    let crc = frame_crc(command, seq, payload);
    let end = 6 + payload.len();

    dst[0..2].copy_from_slice(&HEADER);
    dst[2..4].copy_from_slice(&length_field.to_le_bytes());
    dst[4] = command;
    dst[5] = seq;
    dst[6..end].copy_from_slice(payload);
    dst[end..end + 2].copy_from_slice(&crc.to_le_bytes());
    dst[end + 2..total].copy_from_slice(&TRAILER);
    Ok(total)
}

/// Validate and decode one complete candidate frame.
///
/// `src` must be exactly one frame, as produced by
/// [`RxFrameExtractor`](crate::rx::RxFrameExtractor).
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let len = src.len();
    if len < MIN_FRAME_SIZE {
        return Err(FrameError::TooShort { len });
    }
    if src[0..2] != HEADER {
        return Err(FrameError::BadHeader);
    }
    if src[len - 2..] != TRAILER {
        return Err(FrameError::BadTrailer);
    }

    let length_field = usize::from(u16::from_le_bytes([src[2], src[3]]));
    if LENGTH_FIELD_OUTSIDE + length_field != len {
        return Err(FrameError::LengthMismatch {
            declared: LENGTH_FIELD_OUTSIDE + length_field,
            actual: len,
        });
    }
    // Consistent but with no room for command, seq and CRC.
    if length_field < LENGTH_FIELD_EXTRA {
        return Err(FrameError::TooShort { len });
    }

    let payload_len = length_field - LENGTH_FIELD_EXTRA;
    let command = src[4];
    let seq = src[5];
    let payload = &src[6..6 + payload_len];
    let carried = u16::from_le_bytes([src[6 + payload_len], src[7 + payload_len]]);
    let computed = frame_crc(command, seq, payload);
    if carried != computed {
        return Err(FrameError::ChecksumMismatch {
            expected: carried,
            actual: computed,
        });
    }

    Ok(Frame {
        command,
        seq,
        payload: Bytes::copy_from_slice(payload),
    })
}
