use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use netframe_channel::{is_disconnected, Channel, ChannelConfig, TcpChannel};
use netframe_frame::{FrameReader, FrameSender, SendPipeline};
use tracing::debug;

use crate::error::{PeerError, Result};

/// How long blocking receives park between polls of an idle channel.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-wide connection id. Ids are diagnostic handles for
/// log correlation, not wire-visible protocol state.
pub(crate) fn next_conn_id() -> u64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// A framed TCP connection.
///
/// The read half polls complete frames off the channel; the write half
/// queues payloads into a dedicated send pipeline that coalesces them into
/// single writes. Sending is thread-safe through cloned [`FrameSender`]
/// handles; receiving belongs to whoever holds the `Connection` itself.
pub struct Connection {
    id: u64,
    peer_addr: Option<SocketAddr>,
    reader: FrameReader<TcpChannel>,
    pipeline: SendPipeline,
    sender: FrameSender,
    /// Set once a fatal error or disconnect has been surfaced.
    closed: bool,
}

impl Connection {
    /// Wrap a connected channel, splitting it into read and write halves.
    ///
    /// The channel should already have its socket options applied; use
    /// [`Connection::establish`] to do both in one step.
    pub fn from_channel(channel: TcpChannel) -> Result<Self> {
        let id = next_conn_id();
        let peer_addr = channel.peer_addr();
        let write_half = channel.try_clone()?;
        let pipeline = SendPipeline::spawn(write_half, id)?;
        let sender = pipeline.sender();
        debug!(conn = id, peer = ?peer_addr, "connection established");

        Ok(Self {
            id,
            peer_addr,
            reader: FrameReader::new(channel),
            pipeline,
            sender,
            closed: false,
        })
    }

    /// Apply socket options from `config`, then wrap the channel.
    pub fn establish(channel: TcpChannel, config: &ChannelConfig) -> Result<Self> {
        channel.apply_config(config)?;
        Self::from_channel(channel)
    }

    /// Connection id (diagnostics only).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address, if known at establishment.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Queue a payload for sending.
    ///
    /// Returns once the payload is queued, not once it reaches the wire;
    /// call [`flush`](Connection::flush) to wait for delivery to the OS.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.sender.send(payload).map_err(Into::into)
    }

    /// A cloneable enqueue handle for use from other threads.
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Block until everything queued so far has been handed to the OS.
    pub fn flush(&self) -> Result<()> {
        self.pipeline.flush().map_err(Into::into)
    }

    /// One non-blocking receive poll.
    ///
    /// `Ok(None)` means no complete frame is buffered yet. A fatal framing
    /// or I/O error closes the connection; calls after that report
    /// [`PeerError::Disconnected`].
    pub fn poll_recv(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Err(self.disconnected());
        }
        match self.reader.poll_frame() {
            Ok(frame) => Ok(frame),
            Err(err) => {
                self.close();
                Err(err.into())
            }
        }
    }

    /// Receive the next frame, blocking until one arrives or the peer
    /// disconnects.
    ///
    /// A peer that closes mid-frame leaves the tail of that frame
    /// unreceivable; callers wanting a bound on that case should use
    /// [`recv_timeout`](Connection::recv_timeout).
    pub fn recv(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.poll_recv()? {
                return Ok(frame);
            }
            if self.is_disconnected() {
                self.close();
                return Err(self.disconnected());
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Receive the next frame with a deadline.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.poll_recv()? {
                return Ok(frame);
            }
            if self.is_disconnected() {
                self.close();
                return Err(self.disconnected());
            }
            if Instant::now() >= deadline {
                return Err(PeerError::Timeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Whether the peer side is gone (non-blocking probe).
    ///
    /// Buffered frames that arrived before the close remain receivable;
    /// the probe only reports true once nothing is left to deliver or the
    /// channel itself has failed.
    pub fn is_disconnected(&self) -> bool {
        self.closed || is_disconnected(self.reader.get_ref())
    }

    /// Shut down the channel and stop the send loop.
    ///
    /// Idempotent. Queued-but-unwritten payloads are dropped; call
    /// [`flush`](Connection::flush) first for a graceful drain. The socket
    /// shutdown also fails any write the send loop is blocked in, so
    /// teardown is not stalled by a dead peer.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.reader.get_ref().close();
        self.pipeline.close();
        debug!(conn = self.id, "connection closed");
    }

    fn disconnected(&self) -> PeerError {
        PeerError::Disconnected(format!("conn-{}", self.id))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer_addr)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::thread;

    use crate::connector::connect;
    use crate::listener::Listener;

    fn connected_pair() -> (Connection, Connection) {
        let listener = Listener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr();
        let client = thread::spawn(move || connect(addr).expect("connect should succeed"));
        let server = listener.accept().expect("accept should succeed");
        let client = client.join().expect("connector thread should finish");
        (server, client)
    }

    #[test]
    fn round_trip_one_frame() {
        let (mut server, client) = connected_pair();

        client.send(Bytes::from_static(b"ping")).expect("send");
        let frame = server
            .recv_timeout(Duration::from_secs(3))
            .expect("frame should arrive");
        assert_eq!(frame.as_ref(), b"ping");
    }

    #[test]
    fn empty_payload_round_trip() {
        let (mut server, client) = connected_pair();

        client.send(Bytes::new()).expect("send");
        let frame = server
            .recv_timeout(Duration::from_secs(3))
            .expect("empty frame should arrive");
        assert!(frame.is_empty());
    }

    #[test]
    fn frames_arrive_in_order() {
        let (mut server, client) = connected_pair();

        for i in 0..100u32 {
            client
                .send(Bytes::from(i.to_be_bytes().to_vec()))
                .expect("send");
        }
        for i in 0..100u32 {
            let frame = server
                .recv_timeout(Duration::from_secs(3))
                .expect("frame should arrive");
            assert_eq!(frame.as_ref(), i.to_be_bytes().as_slice());
        }
    }

    #[test]
    fn large_payload_round_trip() {
        // Stay under the socket receive buffer: availability can never
        // cover a payload bigger than the kernel will queue.
        let payload = vec![0xA5u8; 64 * 1024];
        let (mut server, client) = connected_pair();

        client.send(payload.clone()).expect("send");
        let frame = server
            .recv_timeout(Duration::from_secs(5))
            .expect("large frame should arrive");
        assert_eq!(frame.len(), payload.len());
        assert_eq!(frame.as_ref(), payload.as_slice());
    }

    #[test]
    fn recv_timeout_expires_on_silence() {
        let (mut server, _client) = connected_pair();

        let err = server
            .recv_timeout(Duration::from_millis(50))
            .expect_err("no frame should arrive");
        assert!(matches!(err, PeerError::Timeout(_)));
    }

    #[test]
    fn peer_drop_surfaces_disconnect() {
        let (mut server, client) = connected_pair();
        drop(client);

        let err = server
            .recv_timeout(Duration::from_secs(3))
            .expect_err("disconnect should surface");
        assert!(matches!(err, PeerError::Disconnected(_)));

        // The connection stays closed afterwards.
        let err = server.poll_recv().expect_err("closed connection");
        assert!(matches!(err, PeerError::Disconnected(_)));
    }

    #[test]
    fn frames_sent_before_close_remain_receivable() {
        let (mut server, client) = connected_pair();

        client.send(Bytes::from_static(b"parting")).expect("send");
        client.flush().expect("flush");
        drop(client);

        let frame = server
            .recv_timeout(Duration::from_secs(3))
            .expect("frame sent before close should arrive");
        assert_eq!(frame.as_ref(), b"parting");

        let err = server
            .recv_timeout(Duration::from_secs(3))
            .expect_err("disconnect should follow");
        assert!(matches!(err, PeerError::Disconnected(_)));
    }

    #[test]
    fn send_after_close_is_rejected() {
        let (mut server, _client) = connected_pair();

        server.close();
        let err = server
            .send(Bytes::from_static(b"x"))
            .expect_err("send on closed connection");
        assert!(matches!(
            err,
            PeerError::Frame(netframe_frame::FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let (mut server, _client) = connected_pair();
        server.close();
        server.close();
        assert!(server.is_disconnected());
    }

    #[test]
    fn concurrent_senders_share_one_connection() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 100;

        let (mut server, client) = connected_pair();

        let mut producers = Vec::new();
        for p in 0..PRODUCERS {
            let sender = client.sender();
            producers.push(thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    sender
                        .send(Bytes::from(format!("{p}:{i}")))
                        .expect("send should queue");
                }
            }));
        }
        for producer in producers {
            producer.join().expect("producer thread should finish");
        }
        client.flush().expect("flush");

        let mut sequences = vec![Vec::new(); PRODUCERS];
        for _ in 0..PRODUCERS * PER_PRODUCER {
            let frame = server
                .recv_timeout(Duration::from_secs(5))
                .expect("frame should arrive");
            let text = std::str::from_utf8(&frame).expect("payload should be utf8");
            let (p, i) = text.split_once(':').expect("payload should be tagged");
            sequences[p.parse::<usize>().unwrap()].push(i.parse::<usize>().unwrap());
        }

        for sequence in &sequences {
            assert_eq!(sequence.len(), PER_PRODUCER);
            for (expected, got) in sequence.iter().enumerate() {
                assert_eq!(*got, expected);
            }
        }
    }
}
