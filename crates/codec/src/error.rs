//! Error types for the frame codec.

use std::io;
use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced while encoding or decoding frames and sub-messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed or truncated frame header or block.
    #[error("Framing error: {0}")]
    Framing(String),

    /// The frame did not start with the protocol begin token.
    #[error("Protocol begin token mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ProtocolMismatch {
        /// The protocol sentinel.
        expected: u32,
        /// What was read from the stream instead.
        actual: u32,
    },

    /// The reassembled payload would exceed the configured maximum.
    #[error("Frame payload size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Size the payload would have reached.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A delimited sub-message could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A sub-message could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Whether the error leaves the byte stream at an unknown position.
    ///
    /// Once this is true the stream cannot be resynchronized and the owning
    /// connection has to be closed.
    #[must_use]
    pub const fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Framing(_) | Self::ProtocolMismatch { .. } | Self::FrameTooLarge { .. } | Self::Io(_)
        )
    }
}

impl From<prost::DecodeError> for CodecError {
    fn from(err: prost::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<prost::EncodeError> for CodecError {
    fn from(err: prost::EncodeError) -> Self {
        Self::Encode(err.to_string())
    }
}
