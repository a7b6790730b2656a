//! Request/response calls over the pool.

use std::sync::Arc;

use prost::Message;
use tracing::{debug, instrument};
use tubemq_codec::{Codec, RpcCodec, RpcRequest, RpcResponse};
use tubemq_multiplexing::{DialOptions, Pool, RequestContext, Result};

use crate::options::ClientOptions;

/// Transport client for one broker address.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Client<C: Codec = RpcCodec> {
    options: ClientOptions,
    dial_options: DialOptions,
    pool: Arc<Pool>,
    codec: C,
}

impl Client<RpcCodec> {
    /// Create a client using the broker's RPC codec.
    ///
    /// # Errors
    ///
    /// Returns [`tubemq_multiplexing::Error::InvalidOptions`] if the options
    /// are inconsistent.
    pub fn new(options: ClientOptions, pool: Arc<Pool>) -> Result<Self> {
        Self::with_codec(options, pool, RpcCodec::new())
    }
}

impl<C: Codec> Client<C> {
    /// Create a client with a custom codec.
    ///
    /// # Errors
    ///
    /// Returns [`tubemq_multiplexing::Error::InvalidOptions`] if the options
    /// are inconsistent.
    pub fn with_codec(options: ClientOptions, pool: Arc<Pool>, codec: C) -> Result<Self> {
        let dial_options = options.dial_options()?;
        Ok(Self {
            options,
            dial_options,
            pool,
            codec,
        })
    }

    /// The options the client was built from.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The shared pool.
    #[must_use]
    pub const fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Send `request` with `body` as its payload and wait for the response.
    ///
    /// `body` is serialized into the request body's payload slot, overwriting
    /// whatever was there. Errors from encoding, the pool, the connection and
    /// decoding are returned unchanged.
    ///
    /// # Errors
    ///
    /// Any [`tubemq_multiplexing::Error`] raised along the way.
    #[instrument(skip(self, ctx, request, body), fields(address = %self.options.address))]
    pub async fn do_request<M: Message>(
        &self,
        ctx: &RequestContext,
        correlation_id: u32,
        mut request: RpcRequest,
        body: &M,
    ) -> Result<RpcResponse> {
        request.request_body.request = Some(body.encode_to_vec().into());
        let frame = self.codec.encode(correlation_id, &request)?;

        let handle = self
            .pool
            .get(ctx, correlation_id, &self.dial_options)
            .await?;
        handle.write(frame).await?;
        let response = handle.read().await?;

        let response = self.codec.decode(&response)?;
        debug!(
            status = response.response_header.status,
            success = response.is_success(),
            "response received"
        );

        Ok(response)
    }
}
