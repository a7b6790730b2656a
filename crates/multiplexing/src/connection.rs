//! One physical connection shared by many in-flight requests.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tubemq_codec::{Frame, FrameCodec, Response};

use crate::context::RequestContext;
use crate::dial::BoxedStream;
use crate::error::{Error, Result};

/// Lifecycle of a connection. Only `Open` accepts registrations and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Stream established, read loop not yet running.
    Connecting = 0,
    /// Serving requests.
    Open = 1,
    /// Failing pending requests.
    Closing = 2,
    /// Terminal.
    Closed = 3,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

struct PendingEntry {
    generation: u64,
    tx: oneshot::Sender<Result<Frame>>,
}

/// A multiplexed connection to one broker address.
///
/// Many requests share the stream; responses are routed back by correlation
/// id from a single background read loop, in whatever order they arrive.
pub struct MultiplexedConnection {
    id: u64,
    address: String,
    state: AtomicU8,
    pending: Mutex<HashMap<u32, PendingEntry>>,
    next_generation: AtomicU64,
    writer: tokio::sync::Mutex<Option<WriteHalf<BoxedStream>>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for MultiplexedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexedConnection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl MultiplexedConnection {
    /// Take ownership of `stream` and start the read loop.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        id: u64,
        address: impl Into<String>,
        stream: BoxedStream,
        max_payload_size: usize,
    ) -> Arc<Self> {
        let (reader, writer) = tokio::io::split(stream);

        let connection = Arc::new(Self {
            id,
            address: address.into(),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            writer: tokio::sync::Mutex::new(Some(writer)),
            shutdown: CancellationToken::new(),
        });

        let frames = FramedRead::new(reader, FrameCodec::with_max_payload_size(max_payload_size));
        tokio::spawn(Self::read_loop(
            Arc::downgrade(&connection),
            frames,
            connection.shutdown.clone(),
        ));

        connection
            .state
            .store(ConnectionState::Open as u8, Ordering::Release);
        debug!(connection_id = id, address = %connection.address, "connection open");

        connection
    }

    /// Pool-assigned id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Broker address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the connection accepts new requests.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn lost(&self, reason: impl Into<String>) -> Error {
        Error::ConnectionLost {
            connection_id: self.id,
            reason: reason.into(),
        }
    }

    /// Register `correlation_id` as awaiting a response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateCorrelation`] if the id is already pending
    /// here, or [`Error::ConnectionLost`] if the connection is not open.
    pub fn register_pending(self: &Arc<Self>, correlation_id: u32) -> Result<PendingRequest> {
        let (tx, rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut pending = self.pending.lock();

            // Checked under the lock so close() either sees this entry or we see it closing.
            if !self.is_open() {
                return Err(self.lost(format!("connection is {:?}", self.state())));
            }

            match pending.entry(correlation_id) {
                Entry::Occupied(_) => {
                    return Err(Error::DuplicateCorrelation {
                        correlation_id,
                        connection_id: self.id,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(PendingEntry { generation, tx });
                }
            }
        }

        Ok(PendingRequest {
            connection: Arc::clone(self),
            correlation_id,
            generation,
            rx,
        })
    }

    /// Remove a pending entry, only if it is still the one `generation` created.
    fn remove_pending(&self, correlation_id: u32, generation: u64) {
        let mut pending = self.pending.lock();
        if pending
            .get(&correlation_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            pending.remove(&correlation_id);
        }
    }

    /// Write one complete frame.
    ///
    /// The write runs in its own task while holding the write lock, so frames
    /// from concurrent writers never interleave and a caller that gives up
    /// mid-write cannot leave half a frame on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] if the connection is not open, or
    /// [`Error::Io`] if the write fails. A failed write closes the connection.
    pub async fn write(self: &Arc<Self>, frame: Bytes) -> Result<()> {
        if !self.is_open() {
            return Err(self.lost(format!("connection is {:?}", self.state())));
        }

        let connection = Arc::clone(self);
        tokio::spawn(async move { connection.write_frame(&frame).await })
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;

        let Some(stream) = writer.as_mut() else {
            return Err(self.lost("write half already released"));
        };
        if !self.is_open() {
            return Err(self.lost(format!("connection is {:?}", self.state())));
        }

        // A closed connection releases the write lock even if the peer stopped reading.
        let result = tokio::select! {
            result = async {
                stream.write_all(frame).await?;
                stream.flush().await
            } => result,
            () = self.shutdown.cancelled() => {
                return Err(self.lost("connection closed during write"));
            }
        };

        if let Err(e) = result {
            drop(writer);
            error!(connection_id = self.id, address = %self.address, error = %e, "write failed");
            self.close(format!("write failed: {e}"));
            return Err(Error::Io(e));
        }

        Ok(())
    }

    /// Close the connection and fail every pending request with
    /// [`Error::ConnectionLost`]. Idempotent.
    pub fn close(&self, reason: impl Into<String>) {
        let closing = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state < ConnectionState::Closing as u8).then_some(ConnectionState::Closing as u8)
            })
            .is_ok();
        if !closing {
            return;
        }

        let reason = reason.into();
        self.shutdown.cancel();

        let drained = std::mem::take(&mut *self.pending.lock());
        let failed = drained.len();
        for (_, entry) in drained {
            let _ = entry.tx.send(Err(self.lost(reason.clone())));
        }

        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        debug!(
            connection_id = self.id,
            address = %self.address,
            failed,
            %reason,
            "connection closed"
        );
    }

    fn deliver(&self, frame: Frame) {
        let correlation_id = frame.correlation_id();
        let entry = self.pending.lock().remove(&correlation_id);

        match entry {
            Some(entry) => {
                // The receiver may have been dropped after a timeout; nothing to do then.
                let _ = entry.tx.send(Ok(frame));
            }
            None => {
                warn!(
                    connection_id = self.id,
                    correlation_id, "dropping response with no pending request"
                );
            }
        }
    }

    async fn read_loop(
        connection: Weak<Self>,
        mut frames: FramedRead<ReadHalf<BoxedStream>, FrameCodec>,
        shutdown: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                () = shutdown.cancelled() => break,
                next = frames.next() => next,
            };

            let Some(conn) = connection.upgrade() else {
                break;
            };

            match next {
                Some(Ok(frame)) => conn.deliver(frame),
                Some(Err(e)) => {
                    error!(connection_id = conn.id, address = %conn.address, error = %e, "failed to decode frame");
                    conn.close(format!("decode failed: {e}"));
                    break;
                }
                None => {
                    debug!(connection_id = conn.id, "peer closed the stream");
                    conn.close("peer closed the stream");
                    break;
                }
            }
        }

        drop(frames);
        if let Some(conn) = connection.upgrade() {
            conn.close("read loop stopped");
            let writer = conn.writer.lock().await.take();
            if let Some(mut writer) = writer {
                let _ = writer.shutdown().await;
            }
        }
    }
}

impl Drop for MultiplexedConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A registered request awaiting its response.
///
/// Dropping it before the response arrives removes the pending entry, so a
/// late response for it is discarded by the read loop.
#[derive(Debug)]
pub struct PendingRequest {
    connection: Arc<MultiplexedConnection>,
    correlation_id: u32,
    generation: u64,
    rx: oneshot::Receiver<Result<Frame>>,
}

impl PendingRequest {
    /// The correlation id this request is registered under.
    #[must_use]
    pub const fn correlation_id(&self) -> u32 {
        self.correlation_id
    }

    /// The connection the request is pending on.
    #[must_use]
    pub const fn connection(&self) -> &Arc<MultiplexedConnection> {
        &self.connection
    }

    /// Wait for the response, the context ending, or the connection closing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or [`Error::Cancelled`] when `ctx` ends
    /// first (the pending entry is removed and the connection stays open), or
    /// [`Error::ConnectionLost`] if the connection closes.
    pub async fn wait(mut self, ctx: &RequestContext) -> Result<Frame> {
        tokio::select! {
            result = &mut self.rx => {
                result.unwrap_or_else(|_| Err(self.connection.lost("pending entry dropped")))
            }
            err = ctx.done() => {
                debug!(
                    connection_id = self.connection.id,
                    correlation_id = self.correlation_id,
                    error = %err,
                    "gave up waiting for response"
                );
                Err(err)
            }
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        // No-op once delivered; the generation guards a newer entry reusing the id.
        self.connection
            .remove_pending(self.correlation_id, self.generation);
    }
}
