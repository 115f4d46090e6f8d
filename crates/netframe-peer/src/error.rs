use std::time::Duration;

/// Errors that can occur on framed connections.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Channel-level error (bind, connect, accept, socket options).
    #[error("channel error: {0}")]
    Channel(#[from] netframe_channel::ChannelError),

    /// Framing-level error (codec, reader, send pipeline).
    #[error("frame error: {0}")]
    Frame(#[from] netframe_frame::FrameError),

    /// The peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// A receive deadline expired.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for peer operations.
pub type Result<T> = std::result::Result<T, PeerError>;
