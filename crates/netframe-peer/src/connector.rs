use std::net::ToSocketAddrs;

use netframe_channel::{ChannelConfig, TcpTransport};

use crate::connection::Connection;
use crate::error::Result;

/// Connect to a listening endpoint with default channel options.
pub fn connect(addr: impl ToSocketAddrs) -> Result<Connection> {
    connect_with_config(addr, &ChannelConfig::default())
}

/// Connect with explicit channel options.
pub fn connect_with_config(addr: impl ToSocketAddrs, config: &ChannelConfig) -> Result<Connection> {
    let channel = TcpTransport::connect(addr)?;
    Connection::establish(channel, config)
}
