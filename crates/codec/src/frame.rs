//! Wire framing: header, block chunking and stream reassembly.

use crate::buffer::ReassemblyBuffer;
use crate::error::{CodecError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Sentinel every frame starts with.
pub const BEGIN_TOKEN: u32 = 0xFF7F_F4FE;

/// Largest block the encoder emits.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Frame header size (4 bytes token + 4 bytes correlation id + 4 bytes block count).
pub const FRAME_HEADER_LEN: usize = 12;

/// Size of each block's length prefix.
pub const BLOCK_LEN_SIZE: usize = 4;

/// Default cap on a reassembled payload (10MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Access to a decoded frame, as consumed by response decoding.
pub trait Response {
    /// Correlation id the peer tagged the frame with.
    fn correlation_id(&self) -> u32;

    /// The reassembled logical payload.
    fn payload(&self) -> &Bytes;
}

/// One frame: a correlation id and its logical payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    correlation_id: u32,
    payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub const fn new(correlation_id: u32, payload: Bytes) -> Self {
        Self {
            correlation_id,
            payload,
        }
    }

    /// Split the frame into its parts.
    #[must_use]
    pub fn into_parts(self) -> (u32, Bytes) {
        (self.correlation_id, self.payload)
    }
}

impl Response for Frame {
    fn correlation_id(&self) -> u32 {
        self.correlation_id
    }

    fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Number of blocks a payload of `len` bytes is split into.
#[must_use]
pub const fn calc_block_count(len: usize) -> usize {
    len.div_ceil(MAX_BLOCK_SIZE)
}

/// Total encoded size of a frame carrying `len` payload bytes.
#[must_use]
pub const fn encoded_frame_len(len: usize) -> usize {
    FRAME_HEADER_LEN + calc_block_count(len) * BLOCK_LEN_SIZE + len
}

/// Append a complete frame for `payload` to `buf`.
///
/// # Errors
///
/// Returns [`CodecError::FrameTooLarge`] if the block count does not fit the
/// 4-byte header field.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_frame_into(correlation_id: u32, payload: &[u8], buf: &mut BytesMut) -> Result<()> {
    let block_count =
        u32::try_from(calc_block_count(payload.len())).map_err(|_| CodecError::FrameTooLarge {
            size: payload.len(),
            max: u32::MAX as usize * MAX_BLOCK_SIZE,
        })?;

    buf.reserve(encoded_frame_len(payload.len()));
    buf.put_u32(BEGIN_TOKEN);
    buf.put_u32(correlation_id);
    buf.put_u32(block_count);

    for block in payload.chunks(MAX_BLOCK_SIZE) {
        // Bounded by MAX_BLOCK_SIZE
        buf.put_u32(block.len() as u32);
        buf.put_slice(block);
    }

    Ok(())
}

/// Encode `payload` as a standalone frame.
///
/// # Errors
///
/// Returns [`CodecError::FrameTooLarge`] if the block count does not fit the
/// 4-byte header field.
pub fn encode_frame(correlation_id: u32, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_frame_into(correlation_id, payload, &mut buf)?;
    Ok(buf.freeze())
}

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    Header,
    BlockLength { correlation_id: u32, remaining: u32 },
    Block { correlation_id: u32, remaining: u32, len: usize },
}

/// Incremental frame decoder and chunking encoder.
///
/// Decoding is resumable: bytes arrive in arbitrary pieces and blocks are
/// copied into a [`ReassemblyBuffer`] as soon as each one is complete. The
/// decoder does not enforce [`MAX_BLOCK_SIZE`] on incoming blocks, only the
/// overall payload cap.
#[derive(Debug)]
pub struct FrameCodec {
    state: DecodeState,
    payload: ReassemblyBuffer,
}

impl FrameCodec {
    /// Create a new frame codec.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_payload_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a codec with custom max payload size.
    #[must_use]
    pub fn with_max_payload_size(max: usize) -> Self {
        Self {
            state: DecodeState::Header,
            payload: ReassemblyBuffer::new(max),
        }
    }

    /// Whether the decoder sits between frames.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, DecodeState::Header)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if src.len() < FRAME_HEADER_LEN {
                        src.reserve(FRAME_HEADER_LEN - src.len());
                        return Ok(None);
                    }

                    let token = src.get_u32();
                    if token != BEGIN_TOKEN {
                        return Err(CodecError::ProtocolMismatch {
                            expected: BEGIN_TOKEN,
                            actual: token,
                        });
                    }

                    let correlation_id = src.get_u32();
                    let block_count = src.get_u32();
                    self.payload.clear();

                    if block_count == 0 {
                        return Ok(Some(Frame::new(correlation_id, Bytes::new())));
                    }

                    self.state = DecodeState::BlockLength {
                        correlation_id,
                        remaining: block_count,
                    };
                }
                DecodeState::BlockLength {
                    correlation_id,
                    remaining,
                } => {
                    if src.len() < BLOCK_LEN_SIZE {
                        return Ok(None);
                    }

                    let len = src.get_u32() as usize;
                    // Fail before buffering anything the payload cap would reject anyway
                    self.payload.reserve(len)?;

                    self.state = DecodeState::Block {
                        correlation_id,
                        remaining,
                        len,
                    };
                }
                DecodeState::Block {
                    correlation_id,
                    remaining,
                    len,
                } => {
                    if src.len() < len {
                        src.reserve(len - src.len());
                        return Ok(None);
                    }

                    self.payload.extend_from_slice(&src[..len])?;
                    src.advance(len);

                    if remaining == 1 {
                        self.state = DecodeState::Header;
                        return Ok(Some(Frame::new(correlation_id, self.payload.take())));
                    }

                    self.state = DecodeState::BlockLength {
                        correlation_id,
                        remaining: remaining - 1,
                    };
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        if src.is_empty() && self.is_idle() {
            Ok(None)
        } else {
            Err(CodecError::Framing(format!(
                "stream closed mid-frame ({} bytes unread, state {:?})",
                src.len(),
                self.state
            )))
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, buf: &mut BytesMut) -> Result<()> {
        encode_frame_into(frame.correlation_id, &frame.payload, buf)
    }
}
