//! Reliable length-prefixed messaging over TCP.
//!
//! netframe turns a raw TCP stream into discrete binary messages: each
//! message travels as a 4-byte big-endian length prefix followed by the
//! payload. Reads are incremental and non-blocking, disconnects are
//! detected without consuming data, and each connection's sends are
//! queued and coalesced into single writes by a dedicated pipeline
//! thread.
//!
//! # Crate Structure
//!
//! - [`channel`]: TCP byte channels with readiness probing
//! - [`frame`]: the wire codec, incremental frame reader, and send pipeline
//! - [`peer`]: listener, connector, and framed connections (requires the
//!   `peer` feature, on by default)
//!
//! # Example
//!
//! ```no_run
//! use netframe::peer::{connect, Listener};
//!
//! # fn main() -> Result<(), netframe::peer::PeerError> {
//! let listener = Listener::bind("127.0.0.1:0")?;
//! let addr = listener.local_addr();
//!
//! let client = connect(addr)?;
//! client.send(b"hello".to_vec())?;
//!
//! let mut server = listener.accept()?;
//! let message = server.recv()?;
//! assert_eq!(message.as_ref(), b"hello");
//! # Ok(())
//! # }
//! ```

/// Re-export channel types.
pub mod channel {
    pub use netframe_channel::*;
}

/// Re-export framing types.
pub mod frame {
    pub use netframe_frame::*;
}

/// Re-export peer types (requires the `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use netframe_peer::*;
}
