//! Base-128 variable-length unsigned integers.
//!
//! Seven value bits per byte, least significant group first, high bit set on
//! every byte except the last. This is the length prefix used in front of
//! each delimited sub-message.

use crate::error::{CodecError, Result};
use bytes::BufMut;

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `value` occupies once encoded.
#[must_use]
pub const fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Append the encoding of `value` to `buf`.
#[allow(clippy::cast_possible_truncation)]
pub fn encode(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if `data` ends before the varint is
/// terminated, if the encoding is longer than [`MAX_VARINT_LEN`] bytes, or if
/// the value does not fit in a `u64`.
pub fn decode(data: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;

    for (index, &byte) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        let group = u64::from(byte & 0x7F);

        // The tenth byte only has room for the top bit of a u64.
        if index == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(CodecError::Decode("varint overflows u64".to_string()));
        }

        value |= group << (7 * index);

        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }

    if data.len() >= MAX_VARINT_LEN {
        Err(CodecError::Decode(format!(
            "varint longer than {MAX_VARINT_LEN} bytes"
        )))
    } else {
        Err(CodecError::Decode("truncated varint".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use proptest::prelude::*;

    #[test]
    fn test_known_encodings() {
        let cases: [(u64, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (300, &[0xAC, 0x02]),
        ];

        for (value, expected) in cases {
            let mut buf = BytesMut::new();
            encode(value, &mut buf);
            assert_eq!(&buf[..], expected, "encoding of {value}");
            assert_eq!(encoded_len(value), expected.len());
            assert_eq!(decode(expected).unwrap(), (value, expected.len()));
        }
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        // Trailing bytes belong to whatever follows the prefix.
        let (value, consumed) = decode(&[0x05, 0xFF, 0xFF]).unwrap();
        assert_eq!(value, 5);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(decode(&[]), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(decode(&[0x80, 0x80]), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_overlong_input() {
        let data = [0xFF; MAX_VARINT_LEN + 1];
        assert!(matches!(decode(&data), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_u64_max() {
        let mut buf = BytesMut::new();
        encode(u64::MAX, &mut buf);
        assert_eq!(buf.len(), MAX_VARINT_LEN);
        assert_eq!(decode(&buf).unwrap(), (u64::MAX, MAX_VARINT_LEN));
    }

    #[test]
    fn test_tenth_byte_overflow() {
        let mut data = [0xFF; MAX_VARINT_LEN];
        data[MAX_VARINT_LEN - 1] = 0x02;
        assert!(matches!(decode(&data), Err(CodecError::Decode(_))));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(value in any::<u64>(), tail in proptest::collection::vec(any::<u8>(), 0..8)) {
            let mut buf = BytesMut::new();
            encode(value, &mut buf);
            let len = buf.len();
            prop_assert_eq!(len, encoded_len(value));
            buf.extend_from_slice(&tail);
            prop_assert_eq!(decode(&buf).unwrap(), (value, len));
        }
    }
}
