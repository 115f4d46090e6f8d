/// Errors that can occur while framing messages over a channel.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload cannot be represented in a 4-byte length prefix.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The channel reported enough buffered bytes but delivered fewer.
    ///
    /// Frame boundaries can no longer be trusted after this; the
    /// connection must be abandoned.
    #[error("stream desync: wanted {expected} buffered bytes, stream ended after {got}")]
    Desync { expected: usize, got: usize },

    /// A blocking write exceeded the configured send timeout.
    ///
    /// The batch may be partially transmitted, so the connection cannot
    /// be reused.
    #[error("send timed out")]
    SendTimeout,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type for framing operations.
pub type Result<T> = std::result::Result<T, FrameError>;
