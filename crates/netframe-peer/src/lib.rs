//! Framed TCP connection management.
//!
//! Bind or connect, then exchange length-prefixed messages: each
//! [`Connection`] pairs a non-blocking frame reader with a queued send
//! pipeline on its own thread. Disconnects surface as a single error on
//! the receive path; a write failure stops only that connection's
//! pipeline.

pub mod connection;
pub mod connector;
pub mod error;
pub mod listener;

pub use connection::Connection;
pub use connector::{connect, connect_with_config};
pub use error::{PeerError, Result};
pub use listener::Listener;
