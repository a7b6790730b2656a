//! Request-scoped view of a pooled connection.

use std::sync::Arc;

use bytes::Bytes;
use tubemq_codec::Frame;

use crate::connection::{MultiplexedConnection, PendingRequest};
use crate::context::RequestContext;
use crate::error::Result;

/// A connection bound to one correlation id and one caller context.
///
/// Returned by [`crate::Pool::get`] with the correlation id already
/// registered. Dropping the handle releases the registration.
#[derive(Debug)]
pub struct ConnectionHandle {
    pending: PendingRequest,
    ctx: RequestContext,
}

impl ConnectionHandle {
    pub(crate) const fn new(pending: PendingRequest, ctx: RequestContext) -> Self {
        Self { pending, ctx }
    }

    /// The registered correlation id.
    #[must_use]
    pub const fn correlation_id(&self) -> u32 {
        self.pending.correlation_id()
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Arc<MultiplexedConnection> {
        self.pending.connection()
    }

    /// Write a complete frame.
    ///
    /// If the context ends first the call returns early; the frame is still
    /// written whole.
    ///
    /// # Errors
    ///
    /// Returns the context's [`crate::Error::Timeout`] or
    /// [`crate::Error::Cancelled`], or any error from
    /// [`MultiplexedConnection::write`].
    pub async fn write(&self, frame: Bytes) -> Result<()> {
        tokio::select! {
            result = self.pending.connection().write(frame) => result,
            err = self.ctx.done() => Err(err),
        }
    }

    /// Wait for the response frame.
    ///
    /// # Errors
    ///
    /// See [`PendingRequest::wait`].
    pub async fn read(self) -> Result<Frame> {
        let Self { pending, ctx } = self;
        pending.wait(&ctx).await
    }
}
