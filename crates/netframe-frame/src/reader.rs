use std::io::{ErrorKind, Read};

use bytes::Bytes;
use netframe_channel::Channel;

use crate::codec::{decode_len, LEN_PREFIX_SIZE};
use crate::error::{FrameError, Result};

/// Read a frame header if one is fully buffered.
///
/// Returns `Ok(None)` and consumes nothing when fewer than
/// [`LEN_PREFIX_SIZE`] bytes are available; a later call decodes the same
/// header once the rest has arrived. Reads are all-or-nothing per call:
/// partial prefixes are never held across calls.
pub fn try_read_header<C: Channel>(channel: &mut C) -> Result<Option<u32>> {
    if channel.available()? < LEN_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    read_exact_available(channel, &mut prefix)?;
    Ok(Some(decode_len(prefix)))
}

/// Read a frame payload if all `expected` bytes are buffered.
///
/// Returns `Ok(None)` and consumes nothing when fewer than `expected`
/// bytes are available. An `expected` of zero completes immediately with
/// an empty payload.
///
/// A payload larger than the socket's receive buffer can never become
/// fully available; keep messages within the channel's receive budget.
pub fn try_read_payload<C: Channel>(channel: &mut C, expected: u32) -> Result<Option<Bytes>> {
    let expected = expected as usize;
    if expected == 0 {
        return Ok(Some(Bytes::new()));
    }
    if channel.available()? < expected {
        return Ok(None);
    }

    let mut payload = vec![0u8; expected];
    read_exact_available(channel, &mut payload)?;
    Ok(Some(Bytes::from(payload)))
}

/// Drain exactly `buf.len()` bytes the channel has reported as buffered.
///
/// Transient `Interrupted` errors are retried. End-of-stream before the
/// buffer fills means the availability report and the stream disagree;
/// frame boundaries are lost and the connection is unusable.
fn read_exact_available<C: Read>(channel: &mut C, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match channel.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FrameError::Desync {
                    expected: buf.len(),
                    got: filled,
                })
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

/// Polls complete frames off a channel without blocking.
///
/// Owns the in-between-polls decode state: once a header has been read,
/// the expected payload length is pinned here until the payload arrives,
/// so a header is never re-read mid-frame.
pub struct FrameReader<C> {
    channel: C,
    pending: Option<u32>,
}

impl<C: Channel> FrameReader<C> {
    /// Create a reader over a connected channel.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            pending: None,
        }
    }

    /// One non-blocking poll step.
    ///
    /// Returns `Ok(Some(payload))` when a complete frame has materialized
    /// and `Ok(None)` when more bytes must arrive first. Call it whenever
    /// the channel may have new data; a frame whose header has been read
    /// but whose payload has not carries over between calls.
    pub fn poll_frame(&mut self) -> Result<Option<Bytes>> {
        let expected = match self.pending {
            Some(len) => len,
            None => match try_read_header(&mut self.channel)? {
                Some(len) => {
                    self.pending = Some(len);
                    len
                }
                None => return Ok(None),
            },
        };

        match try_read_payload(&mut self.channel, expected)? {
            Some(payload) => {
                self.pending = None;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    /// Length of the frame currently awaited, if a header has been read.
    pub fn pending_len(&self) -> Option<u32> {
        self.pending
    }

    /// Get a reference to the underlying channel.
    pub fn get_ref(&self) -> &C {
        &self.channel
    }

    /// Get a mutable reference to the underlying channel.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Consume the reader, returning the underlying channel.
    pub fn into_inner(self) -> C {
        self.channel
    }
}
