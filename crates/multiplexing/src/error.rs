//! Error types for multiplexed connections and the pool.

use std::io;
use thiserror::Error;
use tubemq_codec::CodecError;

/// Result type alias for connection and pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for connection and pool operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame or sub-message codec failure.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// TCP connect or TLS handshake failed.
    #[error("Failed to dial {address}: {reason}")]
    Dial {
        /// The address we tried to reach.
        address: String,
        /// What went wrong.
        reason: String,
    },

    /// Dial or client options are inconsistent.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The connection closed before a response arrived.
    #[error("Connection {connection_id} lost: {reason}")]
    ConnectionLost {
        /// Pool-assigned connection id.
        connection_id: u64,
        /// Why the connection closed.
        reason: String,
    },

    /// The caller's deadline expired.
    #[error("Request deadline exceeded")]
    Timeout,

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// The correlation id is already in flight on the connection.
    #[error("Correlation id {correlation_id} already pending on connection {connection_id}")]
    DuplicateCorrelation {
        /// The reused correlation id.
        correlation_id: u32,
        /// Connection it is pending on.
        connection_id: u64,
    },

    /// The pool has been closed.
    #[error("Connection pool is closed")]
    PoolClosed,

    /// I/O error on a connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the error only affects the request that saw it.
    ///
    /// Request-local errors leave the connection usable for everyone else.
    #[must_use]
    pub const fn is_request_local(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Cancelled | Self::DuplicateCorrelation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_local_errors() {
        assert!(Error::Timeout.is_request_local());
        assert!(Error::Cancelled.is_request_local());
        assert!(
            Error::DuplicateCorrelation {
                correlation_id: 1,
                connection_id: 1,
            }
            .is_request_local()
        );

        assert!(
            !Error::ConnectionLost {
                connection_id: 1,
                reason: "peer closed".to_string(),
            }
            .is_request_local()
        );
        assert!(!Error::PoolClosed.is_request_local());
        assert!(!Error::Io(io::Error::other("reset")).is_request_local());
    }
}
