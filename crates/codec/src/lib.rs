//! Binary frame codec for the TubeMQ RPC wire protocol.
//!
//! A request travels as a single frame:
//!
//! ```text
//! beginToken    : u32 (0xFF7FF4FE)
//! correlationId : u32
//! blockCount    : u32
//! blockCount x (blockLength: u32, blockBytes)
//! ```
//!
//! The concatenated blocks form the logical payload, which is itself a
//! sequence of varint length-delimited protobuf sub-messages: connection
//! header, request header and request body for a request; connection header,
//! response header and either a response body or an exception body for a
//! response.
//!
//! # Example
//!
//! ```
//! use tubemq_codec::frame::BEGIN_TOKEN;
//! use tubemq_codec::{Codec, RpcCodec, RpcRequest};
//!
//! let codec = RpcCodec::new();
//! let frame = codec.encode(7, &RpcRequest::default()).unwrap();
//!
//! assert_eq!(&frame[..4], &BEGIN_TOKEN.to_be_bytes());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod codec;
pub mod delimited;
pub mod error;
pub mod frame;
pub mod message;
pub mod varint;

pub use codec::{Codec, RpcCodec};
pub use error::{CodecError, Result};
pub use frame::{Frame, FrameCodec, Response};
pub use message::{
    RequestBody, RequestHeader, ResponseBody, ResponseHeader, ResponseStatus, RpcConnHeader,
    RpcRequest, RpcResponse, RspExceptionBody, RspResponseBody,
};

// Re-export dependencies that are part of our public API
pub use bytes::Bytes;
pub use prost::Message;
