//! Request encoding and response decoding on top of the frame format.

use crate::delimited::{read_delimited, write_delimited};
use crate::error::Result;
use crate::frame::{Response, encode_frame};
use crate::message::{
    ResponseBody, ResponseHeader, RpcConnHeader, RpcRequest, RpcResponse, RspExceptionBody,
    RspResponseBody,
};
use bytes::{Bytes, BytesMut};
use tracing::trace;

/// Turns requests into frames and decoded frames into responses.
pub trait Codec: Send + Sync + 'static {
    /// Encode `request` into a complete wire frame tagged with `correlation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CodecError::Encode`] if a sub-message cannot be
    /// serialized.
    fn encode(&self, correlation_id: u32, request: &RpcRequest) -> Result<Bytes>;

    /// Parse the payload of a decoded frame into a structured response.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CodecError::Decode`] if any sub-message is malformed
    /// or truncated.
    fn decode(&self, response: &dyn Response) -> Result<RpcResponse>;
}

/// The broker's RPC codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcCodec;

impl RpcCodec {
    /// Create the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Codec for RpcCodec {
    fn encode(&self, correlation_id: u32, request: &RpcRequest) -> Result<Bytes> {
        encode_request(correlation_id, request)
    }

    fn decode(&self, response: &dyn Response) -> Result<RpcResponse> {
        decode_response(response.correlation_id(), response.payload().clone())
    }
}

/// Build the logical payload of a request: the three delimited sub-messages.
///
/// # Errors
///
/// Returns [`crate::CodecError::Encode`] if a sub-message cannot be serialized.
pub fn encode_request_payload(request: &RpcRequest) -> Result<Bytes> {
    let mut payload = BytesMut::new();
    write_delimited(&request.conn_header, &mut payload)?;
    write_delimited(&request.request_header, &mut payload)?;
    write_delimited(&request.request_body, &mut payload)?;
    Ok(payload.freeze())
}

/// Encode a request as a complete frame.
///
/// # Errors
///
/// Returns [`crate::CodecError::Encode`] if a sub-message cannot be serialized.
pub fn encode_request(correlation_id: u32, request: &RpcRequest) -> Result<Bytes> {
    let payload = encode_request_payload(request)?;
    trace!(correlation_id, payload_len = payload.len(), "encoded request");
    encode_frame(correlation_id, &payload)
}

/// Decode a response payload received under `correlation_id`.
///
/// # Errors
///
/// Returns [`crate::CodecError::Decode`] if any sub-message is malformed or
/// truncated.
pub fn decode_response(correlation_id: u32, mut payload: Bytes) -> Result<RpcResponse> {
    let conn_header: RpcConnHeader = read_delimited(&mut payload)?;
    let response_header: ResponseHeader = read_delimited(&mut payload)?;

    let body = if response_header.is_success() {
        ResponseBody::Success(read_delimited::<RspResponseBody>(&mut payload)?)
    } else {
        ResponseBody::Exception(read_delimited::<RspExceptionBody>(&mut payload)?)
    };

    if !payload.is_empty() {
        trace!(
            correlation_id,
            trailing = payload.len(),
            "ignoring trailing bytes after response body"
        );
    }

    Ok(RpcResponse {
        correlation_id,
        conn_header,
        response_header,
        body,
    })
}

/// Build the logical payload of a response. Used by peers and tests that play
/// the broker's side.
///
/// # Errors
///
/// Returns [`crate::CodecError::Encode`] if a sub-message cannot be serialized.
pub fn encode_response_payload(
    conn_header: &RpcConnHeader,
    response_header: &ResponseHeader,
    body: &ResponseBody,
) -> Result<Bytes> {
    let mut payload = BytesMut::new();
    write_delimited(conn_header, &mut payload)?;
    write_delimited(response_header, &mut payload)?;
    match body {
        ResponseBody::Success(body) => write_delimited(body, &mut payload)?,
        ResponseBody::Exception(body) => write_delimited(body, &mut payload)?,
    }
    Ok(payload.freeze())
}
