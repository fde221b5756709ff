/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the requested address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration string could not be used.
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),

    /// The operation needs a connected peer and there is none.
    #[error("transport not connected")]
    NotConnected,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// Every buffer the transport could queue into is in use.
    #[error("transport buffers exhausted")]
    Exhausted,

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
