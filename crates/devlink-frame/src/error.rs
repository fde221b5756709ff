/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than the smallest possible frame.
    #[error("frame too short ({len} bytes)")]
    TooShort { len: usize },

    /// The frame does not start with `AA 55`.
    #[error("invalid frame header (expected AA 55)")]
    BadHeader,

    /// The frame does not end with `55 AA`.
    #[error("invalid frame trailer (expected 55 AA)")]
    BadTrailer,

    /// The length field disagrees with the number of bytes in the frame.
    #[error("length field mismatch (declared {declared} bytes, frame has {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The CRC carried by the frame does not match its contents.
    #[error("checksum mismatch (frame carries {expected:#06x}, computed {actual:#06x})")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// The payload would push the frame past the maximum frame size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The destination buffer cannot hold the encoded frame.
    #[error("buffer too small ({needed} bytes needed, {available} available)")]
    BufferTooSmall { needed: usize, available: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
