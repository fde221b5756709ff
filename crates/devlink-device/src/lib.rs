//! Device side of the devlink instrument protocol.
//!
//! [`DeviceSession`] is the simulated instrument: it answers host commands
//! and, once streaming, emits continuous or trigger-gated sample data on a
//! millisecond tick. [`Endpoint`] binds a session to any
//! [`Transport`](devlink_transport::Transport) and runs the receive, dispatch,
//! tick and drain loop.

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod payload;
pub mod random;
pub mod samples;
pub mod session;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ChannelSpec, SessionConfig, DEFAULT_DEVICE_ID, MAX_CHANNELS};
pub use endpoint::{test_script, Endpoint, EndpointStats, RECV_BUFFER_SIZE};
pub use error::{DeviceError, Result};
pub use payload::{
    ChannelConfigEntry, DataPacket, DeviceInfo, EventTriggered, LogLevel, LogMessage, Nack,
    StatusReport, StreamMode, StreamStatus,
};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use samples::{SampleSource, SineNoise};
pub use session::{ChannelState, DeviceSession, TriggerState, DATA_SEND_INTERVAL_MS};
