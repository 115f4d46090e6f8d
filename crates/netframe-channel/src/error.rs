use std::net::SocketAddr;

/// Errors that can occur in channel setup and socket operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The address string could not be resolved to any socket address.
    #[error("address resolution failed: {0}")]
    Resolve(std::io::Error),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
