use std::collections::VecDeque;
use std::io::{ErrorKind, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace};

use crate::codec::{encode_batch, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Initial capacity of the reusable batch encode buffer.
const INITIAL_BATCH_CAPACITY: usize = 8 * 1024;

/// Queue state behind the pipeline mutex.
struct Inner {
    queue: VecDeque<Bytes>,
    /// Wake latch. Set by every enqueue, cleared by the drain loop just
    /// before it inspects the queue, so an enqueue landing between a drain
    /// and the next wait is never missed.
    signaled: bool,
    /// Cooperative stop flag, observed between loop iterations.
    closing: bool,
    /// Set by the loop on exit. Enqueues after this fail fast.
    terminated: bool,
    /// Payloads accepted into the queue.
    accepted: u64,
    /// Payloads handed to the OS.
    flushed: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Wakes the drain loop.
    wake: Condvar,
    /// Wakes callers blocked in [`SendPipeline::flush`].
    drained: Condvar,
}

fn lock(shared: &Shared) -> MutexGuard<'_, Inner> {
    shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable enqueue handle for a connection's send pipeline.
///
/// `send` is fire-and-forget: it returns once the payload is queued, not
/// once it reaches the wire. Any number of threads may hold senders for
/// the same connection; each sender's own messages keep their relative
/// order on the wire.
#[derive(Clone)]
pub struct FrameSender {
    shared: Arc<Shared>,
}

impl FrameSender {
    /// Queue a payload for transmission.
    ///
    /// The queue is unbounded; callers that can outrun the peer for long
    /// stretches own their own backpressure. Fails once the pipeline is
    /// closing or has stopped.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let mut inner = lock(&self.shared);
        if inner.terminated || inner.closing {
            return Err(FrameError::ConnectionClosed);
        }
        inner.queue.push_back(payload);
        inner.accepted += 1;
        inner.signaled = true;
        drop(inner);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Number of payloads queued and not yet picked up by the drain loop.
    pub fn queued(&self) -> usize {
        lock(&self.shared).queue.len()
    }

    /// Whether the pipeline has stopped accepting payloads.
    pub fn is_closed(&self) -> bool {
        let inner = lock(&self.shared);
        inner.terminated || inner.closing
    }
}

/// Dedicated send loop for one connection.
///
/// Owns a thread that snapshots everything queued, encodes the batch into
/// one contiguous buffer, and hands it to the writer as a single write.
/// With nothing queued the thread parks on a condition variable. A failed
/// or timed-out write stops the loop for this connection only; other
/// connections' pipelines are unaffected.
///
/// Dropping the pipeline asks the loop to stop and joins the thread.
/// Payloads still queued at that point are dropped; call [`flush`] first
/// for a graceful drain.
///
/// [`flush`]: SendPipeline::flush
pub struct SendPipeline {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl SendPipeline {
    /// Spawn the drain loop over the write half of a connection.
    ///
    /// `conn_id` names the loop thread and tags its log events.
    pub fn spawn<W>(writer: W, conn_id: u64) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                signaled: false,
                closing: false,
                terminated: false,
                accepted: 0,
                flushed: 0,
            }),
            wake: Condvar::new(),
            drained: Condvar::new(),
        });

        let loop_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(format!("netframe-send-{conn_id}"))
            .spawn(move || drain_loop(&loop_shared, writer, conn_id))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// A new enqueue handle for this pipeline.
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Ask the loop to stop after its current iteration.
    ///
    /// Payloads still queued are dropped; a batch already being written
    /// completes, bounded by the channel's send timeout. Does not wait for
    /// the thread; dropping the pipeline does.
    pub fn close(&self) {
        let mut inner = lock(&self.shared);
        inner.closing = true;
        drop(inner);
        self.shared.wake.notify_one();
    }

    /// Block until everything queued so far has been handed to the OS.
    ///
    /// Fails if the loop stops before the backlog drains.
    pub fn flush(&self) -> Result<()> {
        let mut inner = lock(&self.shared);
        let target = inner.accepted;
        while inner.flushed < target && !inner.terminated {
            inner = self
                .shared
                .drained
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if inner.flushed < target {
            return Err(FrameError::ConnectionClosed);
        }
        Ok(())
    }

    /// Whether the drain loop has exited.
    pub fn is_terminated(&self) -> bool {
        lock(&self.shared).terminated
    }
}

impl Drop for SendPipeline {
    fn drop(&mut self) {
        self.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn drain_loop<W: Write>(shared: &Shared, mut writer: W, conn_id: u64) {
    let mut batch: Vec<Bytes> = Vec::new();
    let mut wire = BytesMut::with_capacity(INITIAL_BATCH_CAPACITY);

    loop {
        {
            let mut inner = lock(shared);
            if inner.closing {
                break;
            }

            // Clear the latch before inspecting the queue; an enqueue from
            // here on re-sets it and cannot be lost.
            inner.signaled = false;

            if inner.queue.is_empty() {
                while !inner.signaled && !inner.closing {
                    inner = shared
                        .wake
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                continue;
            }

            batch.extend(inner.queue.drain(..));
        }

        wire.clear();
        let encoded = encode_batch(batch.iter(), &mut wire);
        let frames = batch.len();
        batch.clear();

        let outcome = match encoded {
            Ok(()) => write_all(&mut writer, &wire),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                trace!(conn = conn_id, frames, bytes = wire.len(), "batch written");
                let mut inner = lock(shared);
                inner.flushed += frames as u64;
                shared.drained.notify_all();
            }
            Err(err) => {
                info!(conn = conn_id, error = %err, "send pipeline stopped");
                finish(shared);
                return;
            }
        }
    }

    debug!(conn = conn_id, "send pipeline closed");
    finish(shared);
}

fn finish(shared: &Shared) {
    let mut inner = lock(shared);
    inner.terminated = true;
    inner.queue.clear();
    drop(inner);
    shared.drained.notify_all();
}

/// Write a full buffer through `writer`, classifying failures.
///
/// `Ok(0)` from the writer means the channel is gone. `WouldBlock` and
/// `TimedOut` both surface an expired socket send timeout (`SO_SNDTIMEO`
/// reports either, platform-dependent); the batch may be partially
/// transmitted at that point, so the error is fatal to the connection.
fn write_all<W: Write>(writer: &mut W, buf: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match writer.write(&buf[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err)
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                return Err(FrameError::SendTimeout)
            }
            Err(err) => return Err(FrameError::Io(err)),
        }
    }

    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err)
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                return Err(FrameError::SendTimeout)
            }
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}
