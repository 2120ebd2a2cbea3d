//! Variable-length "remaining length" field.
//!
//! Seven bits per byte, least-significant group first, bit 7 set while
//! more bytes follow (same scheme as the MQTT remaining-length field).

use super::FrameError;

/// Longest prefix accepted by the decoder.
pub const MAX_LEN_BYTES: usize = 4;

/// Encode `len`. Zero encodes to an empty prefix.
pub fn encode(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_LEN_BYTES);
    let mut rest = len;
    while rest > 0 {
        let low = u8::try_from(rest % 0x80).unwrap_or_default();
        rest /= 0x80;
        out.push(if rest > 0 { low | 0x80 } else { low });
    }
    out
}

/// Decode a prefix from the start of `buf`.
///
/// Returns `(value, bytes consumed)`. An empty buffer decodes to zero
/// with nothing consumed, mirroring the empty encoding of zero.
pub fn decode(buf: &[u8]) -> Result<(usize, usize), FrameError> {
    let mut value = 0usize;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_LEN_BYTES {
            return Err(FrameError::LengthOverflow {
                max_bytes: MAX_LEN_BYTES,
            });
        }
        value |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    if buf.is_empty() {
        return Ok((0, 0));
    }
    if buf.len() >= MAX_LEN_BYTES {
        return Err(FrameError::LengthOverflow {
            max_bytes: MAX_LEN_BYTES,
        });
    }
    Err(FrameError::Truncated {
        offset: buf.len(),
        needed: 1,
        available: 0,
    })
}
