use std::io::{Read, Write};
use std::time::Duration;

/// A connected duplex byte channel.
///
/// Extends `Read + Write` with the readiness primitives the framing layer
/// is built on: how many bytes the OS has buffered for this channel,
/// whether a read would make progress right now, and explicit teardown.
/// [`TcpChannel`](crate::tcp::TcpChannel) is the production implementation;
/// tests substitute scripted in-memory channels.
pub trait Channel: Read + Write {
    /// Number of bytes currently buffered and readable without blocking.
    fn available(&self) -> std::io::Result<usize>;

    /// Whether a read would make progress within `timeout`.
    ///
    /// A zero timeout polls current readiness without waiting. Returns
    /// `true` at end-of-stream as well: a closed peer makes the channel
    /// readable with nothing buffered.
    fn poll_readable(&self, timeout: Duration) -> std::io::Result<bool>;

    /// Whether the channel is still open on this side.
    fn is_open(&self) -> bool;

    /// Shut down both directions of the channel.
    ///
    /// Idempotent. After close, reads observe end-of-stream and writes
    /// fail.
    fn close(&self) -> std::io::Result<()>;
}
