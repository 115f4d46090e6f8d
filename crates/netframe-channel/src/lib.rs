//! TCP byte-channel layer for netframe.
//!
//! Defines the [`Channel`] trait, a duplex byte stream extended with the
//! readiness primitives frame assembly depends on (buffered byte counts
//! and zero-timeout readability polls), together with its TCP
//! implementation and the disconnect detector used by receive loops.
//!
//! This is the lowest layer of netframe; everything above it is written
//! against [`Channel`], not against sockets.

pub mod error;
pub mod probe;
pub mod tcp;
pub mod traits;

pub use error::{ChannelError, Result};
pub use probe::is_disconnected;
pub use tcp::{ChannelConfig, TcpChannel, TcpTransport, DEFAULT_SEND_TIMEOUT};
pub use traits::Channel;
