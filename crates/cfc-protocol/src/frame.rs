//! Length-delimited entry framing: `[type-tag][length][payload]`.
//!
//! The tag selects how the payload is interpreted and the length lets a
//! reader step over frames it has no use for.

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{ProtocolError, ProtocolResult};

/// A decoded frame borrowing its payload from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub tag: u8,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Append a frame to `enc`.
    pub fn encode(enc: &mut Encoder, tag: u8, payload: &[u8]) {
        enc.write_u8(tag);
        enc.write_bytes(payload);
    }

    /// Read the next frame.
    pub fn decode(dec: &mut Decoder<'a>) -> ProtocolResult<Self> {
        let tag = dec.read_u8()?;
        let payload = dec.read_bytes()?;
        Ok(Self { tag, payload })
    }

    /// Decode a buffer that must hold exactly one frame with the given tag.
    pub fn decode_exact(data: &'a [u8], expected_tag: u8) -> ProtocolResult<Self> {
        let mut dec = Decoder::new(data);
        let frame = Self::decode(&mut dec)?;
        if frame.tag != expected_tag {
            return Err(ProtocolError::CorruptEntry {
                offset: 0,
                reason: format!("expected frame tag {expected_tag}, found {}", frame.tag),
            });
        }
        dec.expect_end()?;
        Ok(frame)
    }

    /// Step over the next frame, returning its tag.
    pub fn skip(dec: &mut Decoder<'a>) -> ProtocolResult<u8> {
        let tag = dec.read_u8()?;
        let len = dec.read_len()?;
        dec.read_slice(len)?;
        Ok(tag)
    }

    /// Total encoded size of a frame holding `payload_len` bytes.
    pub fn encoded_len(payload_len: usize) -> usize {
        let mut varint_len = 1;
        let mut rest = payload_len as u64 >> 7;
        while rest > 0 {
            varint_len += 1;
            rest >>= 7;
        }
        1 + varint_len + payload_len
    }
}
