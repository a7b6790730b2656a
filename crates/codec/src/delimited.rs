//! Varint length-delimited protobuf sub-messages.

use crate::error::{CodecError, Result};
use crate::varint;
use bytes::{Buf, Bytes, BytesMut};
use prost::Message;

/// Append `msg` to `buf` as `varint(len) || bytes`.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if the message cannot be serialized.
pub fn write_delimited<M: Message>(msg: &M, buf: &mut BytesMut) -> Result<()> {
    let len = msg.encoded_len();
    buf.reserve(varint::encoded_len(len as u64) + len);
    varint::encode(len as u64, buf);
    msg.encode(buf)?;
    Ok(())
}

/// Parse one delimited message off the front of `data`.
///
/// Consumes exactly the prefix plus the prefixed number of bytes; anything
/// after that is left in `data` for the next sub-message.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the length prefix is missing or
/// malformed, if fewer bytes remain than the prefix announces, or if the
/// message bytes are not a valid `M`.
pub fn read_delimited<M: Message + Default>(data: &mut Bytes) -> Result<M> {
    let (len, prefix_len) = varint::decode(data)
        .map_err(|e| CodecError::Decode(format!("invalid sub-message length prefix: {e}")))?;

    let available = data.len() - prefix_len;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= available)
        .ok_or_else(|| {
            CodecError::Decode(format!(
                "truncated sub-message: prefix announces {len} bytes, {available} remain"
            ))
        })?;

    data.advance(prefix_len);
    let body = data.split_to(len);
    Ok(M::decode(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{RequestBody, RequestHeader, RpcConnHeader};

    #[test]
    fn test_consecutive_messages() {
        let conn_header = RpcConnHeader {
            flag: 1,
            trace_id: Some(99),
            ..Default::default()
        };
        let request_header = RequestHeader {
            service_type: Some(2),
            protocol_ver: Some(2),
        };
        let request_body = RequestBody {
            method: 7,
            timeout: None,
            request: Some(Bytes::from_static(b"opaque")),
        };

        let mut buf = BytesMut::new();
        write_delimited(&conn_header, &mut buf).unwrap();
        write_delimited(&request_header, &mut buf).unwrap();
        write_delimited(&request_body, &mut buf).unwrap();

        let mut data = buf.freeze();
        assert_eq!(read_delimited::<RpcConnHeader>(&mut data).unwrap(), conn_header);
        assert_eq!(read_delimited::<RequestHeader>(&mut data).unwrap(), request_header);
        assert_eq!(read_delimited::<RequestBody>(&mut data).unwrap(), request_body);
        assert!(data.is_empty());
    }

    #[test]
    fn test_prefix_counts_message_length() {
        let body = RequestBody {
            method: 1,
            timeout: None,
            request: Some(Bytes::from(vec![0xAB; 200])),
        };

        let mut buf = BytesMut::new();
        write_delimited(&body, &mut buf).unwrap();

        let (len, prefix_len) = varint::decode(&buf).unwrap();
        assert_eq!(len as usize, body.encoded_len());
        assert_eq!(buf.len(), prefix_len + body.encoded_len());
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut data = Bytes::new();
        let result = read_delimited::<RequestHeader>(&mut data);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let mut buf = BytesMut::new();
        write_delimited(
            &RpcConnHeader {
                flag: 0,
                trace_id: Some(123_456),
                ..Default::default()
            },
            &mut buf,
        )
        .unwrap();
        buf.truncate(buf.len() - 1);

        let mut data = buf.freeze();
        let result = read_delimited::<RpcConnHeader>(&mut data);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_garbage_body_rejected() {
        // Prefix says 2 bytes; 0xFF 0xFF is not a valid field key.
        let mut data = Bytes::from_static(&[0x02, 0xFF, 0xFF]);
        let result = read_delimited::<RpcConnHeader>(&mut data);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
