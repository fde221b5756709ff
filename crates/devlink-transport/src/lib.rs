//! Byte-stream transports for the devlink endpoint.
//!
//! The device core never looks inside a transport. It only pushes received
//! bytes into its frame extractor and hands whole outbound frames back to
//! [`Transport::send`]. This crate provides:
//! - [`TcpServerTransport`]: a single-client TCP server with non-blocking reads
//! - [`LoopbackTransport`]: an in-memory stub driven through a [`LoopbackHandle`]
//! - [`ChunkStreamTransport`]: bounded block pools feeding a dedicated sender thread

pub mod chunk_stream;
pub mod error;
pub mod loopback;
pub mod tcp;
pub mod traits;

pub use chunk_stream::{BlockSink, ChunkProducer, ChunkStreamConfig, ChunkStreamTransport};
pub use error::{Result, TransportError};
pub use loopback::{LoopbackHandle, LoopbackTransport, LOOPBACK_QUEUE_SIZE};
pub use tcp::{parse_bind_addr, TcpServerTransport, DEFAULT_BIND_HOST, DEFAULT_PORT};
pub use traits::Transport;
