//! Per-address pool of multiplexed connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::connection::{MultiplexedConnection, PendingRequest};
use crate::context::RequestContext;
use crate::dial::dial;
use crate::error::{Error, Result};
use crate::handle::ConnectionHandle;
use crate::options::{DialOptions, PoolConfig};

#[derive(Debug, Default)]
struct AddressEntry {
    connections: Mutex<Vec<Arc<MultiplexedConnection>>>,
    /// Serializes dials to this address.
    dial_gate: tokio::sync::Mutex<()>,
}

impl AddressEntry {
    /// Pick the open connection with the fewest pending requests.
    ///
    /// Returns `None` when a new connection should be dialed instead: nothing
    /// is open, or the least loaded connection is at soft capacity and the
    /// address is below its connection limit. Closed connections are evicted
    /// here.
    fn select(&self, config: &PoolConfig) -> Option<Arc<MultiplexedConnection>> {
        let mut connections = self.connections.lock();

        let before = connections.len();
        connections.retain(|connection| connection.is_open());
        let evicted = before - connections.len();
        if evicted > 0 {
            warn!(evicted, remaining = connections.len(), "evicted closed connections");
        }

        let (least_loaded, pending) = connections
            .iter()
            .map(|connection| (connection, connection.pending_count()))
            .min_by_key(|(_, pending)| *pending)?;

        if pending < config.max_in_flight_per_connection
            || connections.len() >= config.max_connections_per_address
        {
            Some(Arc::clone(least_loaded))
        } else {
            None
        }
    }

    fn open_count(&self) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|connection| connection.is_open())
            .count()
    }
}

/// Pool of multiplexed connections keyed by broker address.
///
/// Construct one per process and share it; dropping it closes every
/// connection it created.
#[derive(Debug)]
pub struct Pool {
    config: PoolConfig,
    entries: DashMap<String, Arc<AddressEntry>>,
    next_connection_id: AtomicU64,
    closed: AtomicBool,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl Pool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            next_connection_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// The pool configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether [`Pool::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of open connections to `address`.
    #[must_use]
    pub fn connection_count(&self, address: &str) -> usize {
        self.entries
            .get(address)
            .map_or(0, |entry| entry.open_count())
    }

    fn entry(&self, address: &str) -> Arc<AddressEntry> {
        if let Some(entry) = self.entries.get(address) {
            return Arc::clone(entry.value());
        }

        // entry() holds the shard lock, so concurrent first requests create one entry.
        let entry = self.entries.entry(address.to_string()).or_insert_with(|| {
            debug!(address, "new address entry");
            Arc::default()
        });
        Arc::clone(entry.value())
    }

    async fn acquire(&self, options: &DialOptions) -> Result<Arc<MultiplexedConnection>> {
        let entry = self.entry(&options.address);
        if let Some(connection) = entry.select(&self.config) {
            return Ok(connection);
        }

        let _gate = entry.dial_gate.lock().await;

        // Someone may have dialed while we waited.
        if let Some(connection) = entry.select(&self.config) {
            return Ok(connection);
        }
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let stream = dial(options, self.config.dial_timeout).await?;
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let connection = MultiplexedConnection::start(
            id,
            options.address.clone(),
            stream,
            self.config.max_payload_size,
        );

        entry.connections.lock().push(Arc::clone(&connection));

        // close() may have swept the entries while we were dialing.
        if self.is_closed() {
            connection.close("pool closed");
            return Err(Error::PoolClosed);
        }

        Ok(connection)
    }

    /// Get a connection to `options.address` with `correlation_id` registered
    /// as pending on it.
    ///
    /// `ctx` bounds the whole acquisition, dial included. Ending it aborts the
    /// call without affecting any connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] after [`Pool::close`], [`Error::Dial`]
    /// if a needed connection cannot be established, the context's
    /// [`Error::Timeout`]/[`Error::Cancelled`], or any registration error from
    /// [`MultiplexedConnection::register_pending`].
    #[instrument(skip(self, ctx, options), fields(address = %options.address))]
    pub async fn get(
        &self,
        ctx: &RequestContext,
        correlation_id: u32,
        options: &DialOptions,
    ) -> Result<ConnectionHandle> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let connection = self.acquire_within(ctx, options).await?;
        let pending = self
            .register(ctx, options, connection, correlation_id)
            .await?;
        Ok(ConnectionHandle::new(pending, ctx.clone()))
    }

    async fn acquire_within(
        &self,
        ctx: &RequestContext,
        options: &DialOptions,
    ) -> Result<Arc<MultiplexedConnection>> {
        tokio::select! {
            result = self.acquire(options) => result,
            err = ctx.done() => Err(err),
        }
    }

    /// Register on `connection`, selecting again once if it closed after it
    /// was picked.
    async fn register(
        &self,
        ctx: &RequestContext,
        options: &DialOptions,
        connection: Arc<MultiplexedConnection>,
        correlation_id: u32,
    ) -> Result<PendingRequest> {
        match connection.register_pending(correlation_id) {
            Err(Error::ConnectionLost {
                connection_id,
                reason,
            }) => {
                debug!(connection_id, %reason, "selected connection closed, selecting again");
                self.acquire_within(ctx, options)
                    .await?
                    .register_pending(correlation_id)
            }
            result => result,
        }
    }

    /// Close every connection and refuse further requests. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.entries.clear();

        let mut closed = 0;
        for entry in entries {
            let connections = std::mem::take(&mut *entry.connections.lock());
            for connection in connections {
                connection.close("pool closed");
                closed += 1;
            }
        }

        debug!(closed, "pool closed");
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.close();
    }
}
