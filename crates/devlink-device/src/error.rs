/// Errors raised by the device side outside the protocol itself.
///
/// Protocol-level failures never surface here; the session answers them with
/// a NACK frame instead.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] devlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] devlink_frame::FrameError),

    /// Invalid session configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A payload was shorter than its layout requires.
    #[error("{what} payload truncated: need {needed} bytes, have {actual}")]
    Truncated {
        what: &'static str,
        needed: usize,
        actual: usize,
    },

    /// A payload carried a value outside its defined range.
    #[error("invalid {what} payload: {reason}")]
    InvalidPayload { what: &'static str, reason: String },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
