use std::net::{SocketAddr, ToSocketAddrs};

use netframe_channel::{ChannelConfig, TcpTransport};
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;

/// Accepts framed connections on a TCP address.
///
/// Each accepted connection gets the listener's channel config applied
/// before its read and write halves are split.
pub struct Listener {
    transport: TcpTransport,
    config: ChannelConfig,
}

impl Listener {
    /// Bind to a TCP address with default channel options.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self {
            transport,
            config: ChannelConfig::default(),
        })
    }

    /// Override the channel options applied to accepted connections.
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Connection> {
        let channel = self.transport.accept()?;
        let conn = Connection::establish(channel, &self.config)?;
        debug!(conn = conn.id(), "accepted framed connection");
        Ok(conn)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}
