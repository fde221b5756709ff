//! Framed command link for streaming instruments.
//!
//! devlink recovers CRC-checked command frames from an arbitrary byte stream
//! and drives a simulated data-acquisition device that answers host commands
//! and streams continuous or trigger-gated samples.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream transports (TCP server, loopback, chunk stream)
//! - [`frame`]: Frame codec, receive-side frame recovery and the outbound queue
//! - [`device`]: Device session and driving loop (behind `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use devlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use devlink_frame::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use devlink_device::*;
}
