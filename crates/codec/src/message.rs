//! RPC protocol messages carried inside a frame's payload.

use bytes::Bytes;

/// Connection-level header sent in front of every request and response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcConnHeader {
    /// Message type flag.
    #[prost(int32, required, tag = "1")]
    pub flag: i32,
    /// Trace identifier.
    #[prost(int64, optional, tag = "2")]
    pub trace_id: Option<i64>,
    /// Span identifier.
    #[prost(int64, optional, tag = "3")]
    pub span_id: Option<i64>,
    /// Parent span identifier.
    #[prost(int64, optional, tag = "4")]
    pub parent_id: Option<i64>,
    /// Whether the trace is sampled.
    #[prost(bool, optional, tag = "5")]
    pub sampled: Option<bool>,
}

/// Routes a request to a broker service.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestHeader {
    /// Target service type.
    #[prost(int32, optional, tag = "1")]
    pub service_type: Option<i32>,
    /// Protocol version spoken by the client.
    #[prost(int32, optional, tag = "2")]
    pub protocol_ver: Option<i32>,
}

/// The method call itself; `request` holds the serialized application message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestBody {
    /// RPC method code.
    #[prost(int32, required, tag = "1")]
    pub method: i32,
    /// Server-side processing timeout in milliseconds.
    #[prost(int64, optional, tag = "2")]
    pub timeout: Option<i64>,
    /// Serialized application request.
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub request: Option<Bytes>,
}

/// Outcome of a call as reported by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ResponseStatus {
    /// The call succeeded and a response body follows.
    Success = 0,
    /// The call failed and an exception body follows.
    Error = 1,
    /// The broker hit an unrecoverable failure; an exception body follows.
    Fatal = 2,
}

/// Header of every response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseHeader {
    /// A [`ResponseStatus`] value.
    #[prost(enumeration = "ResponseStatus", required, tag = "1")]
    pub status: i32,
}

impl ResponseHeader {
    /// Build a header carrying `status`.
    #[must_use]
    pub fn with_status(status: ResponseStatus) -> Self {
        Self {
            status: status as i32,
        }
    }

    /// Whether the status selects the response body.
    ///
    /// Anything other than [`ResponseStatus::Success`], including values this
    /// client does not know, selects the exception body.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            ResponseStatus::try_from(self.status),
            Ok(ResponseStatus::Success)
        )
    }
}

/// Body of a successful response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RspResponseBody {
    /// RPC method code being answered.
    #[prost(int32, required, tag = "1")]
    pub method: i32,
    /// Serialized application response.
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub data: Option<Bytes>,
}

/// Body of a failed response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RspExceptionBody {
    /// Broker-side exception class.
    #[prost(string, optional, tag = "1")]
    pub exception_name: Option<String>,
    /// Broker-side stack trace.
    #[prost(string, optional, tag = "2")]
    pub stack_trace: Option<String>,
}

/// A request before framing: the three sub-messages of its payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcRequest {
    /// Connection header.
    pub conn_header: RpcConnHeader,
    /// Request header.
    pub request_header: RequestHeader,
    /// Request body.
    pub request_body: RequestBody,
}

/// The part of a response selected by its header's status.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The call succeeded.
    Success(RspResponseBody),
    /// The call raised an exception on the broker.
    Exception(RspExceptionBody),
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// Correlation id of the request this answers.
    pub correlation_id: u32,
    /// Connection header.
    pub conn_header: RpcConnHeader,
    /// Response header.
    pub response_header: ResponseHeader,
    /// Response or exception body.
    pub body: ResponseBody,
}

impl RpcResponse {
    /// Whether the broker reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.body, ResponseBody::Success(_))
    }

    /// The response body, if the call succeeded.
    #[must_use]
    pub const fn response_body(&self) -> Option<&RspResponseBody> {
        match &self.body {
            ResponseBody::Success(body) => Some(body),
            ResponseBody::Exception(_) => None,
        }
    }

    /// The exception body, if the call failed.
    #[must_use]
    pub const fn exception(&self) -> Option<&RspExceptionBody> {
        match &self.body {
            ResponseBody::Success(_) => None,
            ResponseBody::Exception(body) => Some(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_is_not_success() {
        assert!(ResponseHeader::with_status(ResponseStatus::Success).is_success());
        assert!(!ResponseHeader::with_status(ResponseStatus::Error).is_success());
        assert!(!ResponseHeader::with_status(ResponseStatus::Fatal).is_success());
        assert!(!ResponseHeader { status: 42 }.is_success());
    }
}
