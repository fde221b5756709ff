//! Command framing for the devlink instrument protocol.
//!
//! Every unit on the wire is framed as:
//! - A 2-byte header `AA 55`
//! - A 2-byte little-endian length covering command, sequence, payload and CRC
//! - Command id and sequence number (1 byte each), then the payload
//! - A CRC-16/MODBUS over command, sequence and payload (2 bytes LE)
//! - A 2-byte trailer `55 AA`
//!
//! [`RxFrameExtractor`] recovers candidate frames from an unstructured byte
//! stream, [`decode_frame`] validates them, and [`TxFrameQueue`] holds encoded
//! frames until a transport drains them.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod command;
pub mod error;
pub mod ring;
pub mod rx;
pub mod tx;

#[cfg(feature = "async")]
pub use async_codec::DeviceLinkCodec;
pub use codec::{
    crc16, decode_frame, encode_frame, encode_frame_into, Frame, CRC_INIT, FRAME_OVERHEAD,
    HEADER, MAX_FRAME_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE, TRAILER,
};
pub use command::{command_name, CommandId};
pub use error::{FrameError, Result};
pub use ring::{RingBuffer, RX_BUFFER_SIZE, TX_BUFFER_SIZE};
pub use rx::{Frames, RxFrameExtractor};
pub use tx::TxFrameQueue;
