//! MySQL length-encoded integer / string primitives and packet header framing.
//!
//! Pure functions over byte slices, hand-rolled rather than built on a
//! parser-combinator: the row-limit transducer calls these in its hot loop
//! and needs plain short-input/invalid-prefix signaling, not backtracking.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::protocol::mysql::constants::PACKET_HEADER_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("need {needed} more byte(s) to decode")]
    NeedMore { needed: usize },
    #[error("invalid length-encoded integer prefix 0xFF")]
    Malformed,
}

/// Width in bytes (including the prefix byte itself) of the leint starting at `first_byte`.
pub fn leint_width(first_byte: u8) -> Result<usize, CodecError> {
    match first_byte {
        0xFF => Err(CodecError::Malformed),
        0xFC => Ok(3),
        0xFD => Ok(4),
        0xFE => Ok(9),
        _ => Ok(1),
    }
}

/// Decodes a length-encoded integer at the start of `bytes`.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn leint_value(bytes: &[u8]) -> Result<(u64, usize), CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::NeedMore { needed: 1 });
    }
    let first = bytes[0];
    let width = leint_width(first)?;
    if bytes.len() < width {
        return Err(CodecError::NeedMore {
            needed: width - bytes.len(),
        });
    }
    let value = match first {
        0xFC => LittleEndian::read_u16(&bytes[1..3]) as u64,
        0xFD => {
            let mut buf = [0u8; 4];
            buf[..3].copy_from_slice(&bytes[1..4]);
            LittleEndian::read_u32(&buf) as u64
        }
        0xFE => LittleEndian::read_u64(&bytes[1..9]),
        b => b as u64,
    };
    Ok((value, width))
}

/// Returns a borrowed view of the length-encoded string at the start of `bytes`
/// together with the number of bytes consumed (leint width + string length).
pub fn lestr_view(bytes: &[u8]) -> Result<(&[u8], usize), CodecError> {
    let (len, leint_len) = leint_value(bytes)?;
    let len = len as usize;
    let total = leint_len + len;
    if bytes.len() < total {
        return Err(CodecError::NeedMore {
            needed: total - bytes.len(),
        });
    }
    Ok((&bytes[leint_len..total], total))
}

/// Duplicates a length-encoded string into an owned, NUL-terminated buffer,
/// for call sites that need a C-compatible boundary.
pub fn lestr_copy(bytes: &[u8]) -> Result<(Vec<u8>, usize), CodecError> {
    let (view, advanced) = lestr_view(bytes)?;
    let mut owned = Vec::with_capacity(view.len() + 1);
    owned.extend_from_slice(view);
    owned.push(0);
    Ok((owned, advanced))
}

/// Decoded 4-byte packet header: 3-byte little-endian payload length, 1-byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub payload_len: u32,
    pub sequence: u8,
}

pub fn read_header(bytes: &[u8]) -> Result<PacketHeader, CodecError> {
    if bytes.len() < PACKET_HEADER_LEN {
        return Err(CodecError::NeedMore {
            needed: PACKET_HEADER_LEN - bytes.len(),
        });
    }
    let payload_len = LittleEndian::read_u24(&bytes[0..3]);
    let sequence = bytes[3];
    Ok(PacketHeader {
        payload_len,
        sequence,
    })
}
