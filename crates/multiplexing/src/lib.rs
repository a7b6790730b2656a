//! Multiplexed broker connections and the pool that owns them.
//!
//! Many logical requests share a small number of TCP (optionally TLS)
//! connections per broker address. Each connection runs one read loop that
//! routes response frames to callers by correlation id; callers register
//! their id, write a frame and wait under a [`RequestContext`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tubemq_codec::frame::encode_frame;
//! use tubemq_multiplexing::{DialOptions, Pool, PoolConfig, RequestContext};
//!
//! # async fn example() -> tubemq_multiplexing::Result<()> {
//! let pool = Pool::new(PoolConfig::default());
//! let ctx = RequestContext::with_timeout(Duration::from_secs(3));
//!
//! let handle = pool.get(&ctx, 1, &DialOptions::tcp("127.0.0.1:8715")).await?;
//! handle.write(encode_frame(1, b"payload")?).await?;
//! let response = handle.read().await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod context;
pub mod dial;
pub mod error;
pub mod handle;
pub mod options;
pub mod pool;
pub mod tls;

pub use connection::{ConnectionState, MultiplexedConnection, PendingRequest};
pub use context::RequestContext;
pub use dial::{AsyncStream, BoxedStream, dial};
pub use error::{Error, Result};
pub use handle::ConnectionHandle;
pub use options::{DialOptions, Network, PoolConfig, TlsOptions};
pub use pool::Pool;
