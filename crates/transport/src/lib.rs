//! Client transport for the TubeMQ broker.
//!
//! Composes the frame codec and the connection pool into a single call:
//! encode the request, acquire a connection, write, wait for the matching
//! response and decode it.
//!
//! The transport handles:
//! - Serializing the application body into the request payload
//! - Connection reuse through a shared [`Pool`]
//! - Correlating the response by the caller's correlation id
//!
//! It adds no retries; every error from the layers below is returned as is.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tubemq_transport::{Client, ClientOptions, Pool, PoolConfig, RequestContext, RpcRequest};
//!
//! # #[derive(Clone, PartialEq, prost::Message)]
//! # struct Heartbeat {
//! #     #[prost(string, tag = "1")]
//! #     client_id: String,
//! # }
//! # async fn example() -> tubemq_transport::Result<()> {
//! let pool = Arc::new(Pool::new(PoolConfig::default()));
//! let client = Client::new(ClientOptions::new("127.0.0.1:8715"), pool)?;
//!
//! let ctx = RequestContext::with_timeout(Duration::from_secs(3));
//! let body = Heartbeat { client_id: "consumer-1".to_string() };
//! let response = client.do_request(&ctx, 1, RpcRequest::default(), &body).await?;
//!
//! if let Some(exception) = response.exception() {
//!     eprintln!("broker raised {:?}", exception.exception_name);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod options;

pub use client::Client;
pub use options::ClientOptions;

// Re-export the layers a caller needs to build requests and read responses
pub use tubemq_codec::{
    Codec, RequestBody, RequestHeader, ResponseBody, ResponseHeader, ResponseStatus,
    RpcCodec, RpcConnHeader, RpcRequest, RpcResponse, RspExceptionBody, RspResponseBody,
};
pub use tubemq_multiplexing::{Error, Pool, PoolConfig, RequestContext, Result};
