use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ChannelError, Result};
use crate::traits::Channel;

/// Send timeout applied when a config does not override it.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Socket options applied to every new channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Disable Nagle's algorithm on the socket. Default: `true`.
    pub no_delay: bool,
    /// Upper bound for each blocking write (`SO_SNDTIMEO`). A write that
    /// exceeds it fails instead of stalling its send loop indefinitely.
    /// `None` leaves writes unbounded. Default: 30 seconds.
    pub send_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            no_delay: true,
            send_timeout: Some(DEFAULT_SEND_TIMEOUT),
        }
    }
}

impl ChannelConfig {
    /// Set whether Nagle's algorithm is disabled.
    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    /// Set the per-write send timeout.
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }
}

/// A connected TCP channel.
///
/// Wraps a `TcpStream` with the readiness primitives of [`Channel`].
/// `try_clone` produces a second handle to the same socket sharing the
/// open flag, which is how a connection is split into read and write
/// halves.
pub struct TcpChannel {
    stream: TcpStream,
    open: Arc<AtomicBool>,
}

impl TcpChannel {
    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Apply socket options from `config`.
    pub fn apply_config(&self, config: &ChannelConfig) -> Result<()> {
        self.stream.set_nodelay(config.no_delay)?;
        self.stream.set_write_timeout(config.send_timeout)?;
        Ok(())
    }

    /// Set the per-write timeout (`SO_SNDTIMEO`) on the socket.
    pub fn set_send_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Clone the channel: new descriptor handle, shared open flag.
    pub fn try_clone(&self) -> Result<Self> {
        let stream = self.stream.try_clone()?;
        Ok(Self {
            stream,
            open: Arc::clone(&self.open),
        })
    }

    /// Remote address, if still known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Local address, if still known.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.local_addr().ok()
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Channel for TcpChannel {
    #[cfg(unix)]
    fn available(&self) -> io::Result<usize> {
        use std::os::fd::AsRawFd;

        let mut count: libc::c_int = 0;
        // SAFETY: `count` is a valid writable pointer for FIONREAD's c_int
        // result, and the fd is an open socket descriptor owned by this
        // process.
        let rc = unsafe { libc::ioctl(self.stream.as_raw_fd(), libc::FIONREAD, &mut count) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(count.max(0) as usize)
    }

    #[cfg(not(unix))]
    fn available(&self) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "buffered byte counts require a unix platform",
        ))
    }

    #[cfg(unix)]
    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        use std::os::fd::AsRawFd;

        let mut pollfd = libc::pollfd {
            fd: self.stream.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        // SAFETY: `pollfd` is a valid array of one initialized descriptor
        // for the duration of the call.
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(false);
        }
        if pollfd.revents & libc::POLLNVAL != 0 {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket descriptor no longer valid",
            ));
        }
        Ok(pollfd.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0)
    }

    #[cfg(not(unix))]
    fn poll_readable(&self, _timeout: Duration) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "readiness probing requires a unix platform",
        ))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) -> io::Result<()> {
        self.open.store(false, Ordering::Release);
        match self.stream.shutdown(Shutdown::Both) {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl std::fmt::Debug for TcpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpChannel")
            .field("peer", &self.peer_addr())
            .field("open", &self.is_open())
            .finish()
    }
}

/// TCP transport: bind, accept, and connect [`TcpChannel`]s.
///
/// Addresses that resolve to multiple candidates are tried in order; the
/// last failure is reported if none succeeds.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on a TCP address.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let mut last_err = None;
        for candidate in resolve(addr)? {
            match TcpListener::bind(candidate) {
                Ok(listener) => {
                    let local_addr = listener.local_addr().map_err(ChannelError::Io)?;
                    info!(addr = %local_addr, "listening on tcp socket");
                    return Ok(Self {
                        listener,
                        local_addr,
                    });
                }
                Err(err) => last_err = Some((candidate, err)),
            }
        }
        match last_err {
            Some((addr, source)) => Err(ChannelError::Bind { addr, source }),
            None => Err(empty_resolution()),
        }
    }

    /// Accept the next incoming connection (blocking).
    pub fn accept(&self) -> Result<TcpChannel> {
        let (stream, peer) = self.listener.accept().map_err(ChannelError::Accept)?;
        debug!(addr = %peer, "accepted connection");
        Ok(TcpChannel::from_stream(stream))
    }

    /// Connect to a listening TCP endpoint.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<TcpChannel> {
        let mut last_err = None;
        for candidate in resolve(addr)? {
            match TcpStream::connect(candidate) {
                Ok(stream) => {
                    debug!(addr = %candidate, "connected to tcp endpoint");
                    return Ok(TcpChannel::from_stream(stream));
                }
                Err(err) => last_err = Some((candidate, err)),
            }
        }
        match last_err {
            Some((addr, source)) => Err(ChannelError::Connect { addr, source }),
            None => Err(empty_resolution()),
        }
    }

    /// The address this transport is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

fn resolve(addr: impl ToSocketAddrs) -> Result<Vec<SocketAddr>> {
    let addrs = addr
        .to_socket_addrs()
        .map_err(ChannelError::Resolve)?
        .collect();
    Ok(addrs)
}

fn empty_resolution() -> ChannelError {
    ChannelError::Resolve(io::Error::new(
        io::ErrorKind::InvalidInput,
        "address resolved to no socket addresses",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn tcp_pair() -> (TcpChannel, TcpChannel) {
        let transport = TcpTransport::bind("127.0.0.1:0").expect("transport should bind");
        let addr = transport.local_addr();
        let client =
            thread::spawn(move || TcpTransport::connect(addr).expect("connect should succeed"));
        let server = transport.accept().expect("accept should succeed");
        let client = client.join().expect("connector thread should finish");
        (server, client)
    }

    #[cfg(unix)]
    fn wait_available(channel: &TcpChannel, want: usize) -> usize {
        use std::time::Instant;

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let got = channel.available().expect("available should succeed");
            if got >= want || Instant::now() >= deadline {
                return got;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn bind_accept_connect_roundtrip() {
        let (mut server, mut client) = tcp_pair();

        client.write_all(b"hello").expect("client write");
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).expect("server read");
        assert_eq!(&buf, b"hello");

        server.write_all(b"world").expect("server write");
        client.read_exact(&mut buf).expect("client read");
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn unresolvable_address_is_resolve_error() {
        let err = TcpTransport::connect("127.0.0.1:notaport").expect_err("should not resolve");
        assert!(matches!(err, ChannelError::Resolve(_)));
    }

    #[test]
    fn apply_config_on_connected_channel() {
        let (server, _client) = tcp_pair();
        let config = ChannelConfig::default()
            .with_no_delay(false)
            .with_send_timeout(Some(Duration::from_secs(5)));
        server.apply_config(&config).expect("config should apply");
    }

    #[test]
    fn try_clone_shares_open_flag() {
        let (server, _client) = tcp_pair();
        let clone = server.try_clone().expect("clone should succeed");
        assert!(clone.is_open());

        server.close().expect("close should succeed");
        assert!(!clone.is_open());
    }

    #[test]
    fn close_is_idempotent() {
        let (server, _client) = tcp_pair();
        server.close().expect("first close should succeed");
        server.close().expect("second close should succeed");
        assert!(!server.is_open());
    }

    #[cfg(unix)]
    #[test]
    fn available_tracks_buffered_bytes() {
        let (mut server, mut client) = tcp_pair();
        assert_eq!(server.available().expect("available"), 0);

        client.write_all(b"abcde").expect("client write");
        assert_eq!(wait_available(&server, 5), 5);

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).expect("server read");
        assert_eq!(server.available().expect("available"), 0);
    }

    #[cfg(unix)]
    #[test]
    fn poll_readable_times_out_when_idle() {
        let (server, _client) = tcp_pair();
        let readable = server
            .poll_readable(Duration::from_millis(20))
            .expect("poll should succeed");
        assert!(!readable);
    }

    #[cfg(unix)]
    #[test]
    fn poll_readable_sees_buffered_bytes() {
        let (server, mut client) = tcp_pair();
        client.write_all(b"x").expect("client write");
        let readable = server
            .poll_readable(Duration::from_secs(1))
            .expect("poll should succeed");
        assert!(readable);
    }

    #[cfg(unix)]
    #[test]
    fn peer_close_reports_readable_at_eof() {
        let (server, client) = tcp_pair();
        drop(client);

        let readable = server
            .poll_readable(Duration::from_secs(1))
            .expect("poll should succeed");
        assert!(readable);
        assert_eq!(server.available().expect("available"), 0);
    }
}
