//! Binary sub-device management protocol.
//!
//! Frames travel inside `c2s_raw` / `s2c_raw` envelopes on the custom
//! channel. Layout of an outgoing frame:
//!
//! ```text
//! [version: 4][remaining length: varlen][flag: 1 = 0][command: 2 = 0x0093]
//! [sequence: 4, BE][action: 1][action payload ...]
//! ```
//!
//! Encoding is pure (no I/O); see [`Request::encode`] for the outbound side
//! and [`parse_frame`] / [`Report::decode`] for the inbound side.

mod decode;
mod encode;
pub mod varlen;

use thiserror::Error;

pub use decode::{Frame, Report, SubDeviceRecord, parse_frame};
pub use encode::Request;

/// Fixed protocol version tag leading every frame.
pub const PROTOCOL_VERSION: [u8; 4] = [0x00, 0x00, 0x00, 0x03];

/// Transparent business command. Frames carrying it also carry a sequence number.
pub const BUSINESS_COMMAND: u16 = 0x0093;

/// Width of a cloud device identifier.
pub const LEN_DID: usize = 22;

/// Width of a product key.
pub const LEN_PRODUCT_KEY: usize = 32;

/// One-byte action codes of the sub-device protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Sub-device went online / offline (inbound).
    SubDeviceStatus = 0x10,
    /// Add sub-devices, optionally filtered by MAC (outbound).
    AddSubDevice = 0x56,
    /// Acknowledgement of [`Action::AddSubDevice`] (inbound).
    AddSubDeviceAck = 0x57,
    /// Delete one sub-device by numeric handle (outbound).
    DeleteSubDevice = 0x58,
    /// Acknowledgement of [`Action::DeleteSubDevice`] (inbound).
    DeleteSubDeviceAck = 0x59,
    /// Request the full sub-device list (outbound).
    GetSubDeviceList = 0x5A,
    /// Response to [`Action::GetSubDeviceList`] (inbound).
    SubDeviceList = 0x5B,
    /// Unsolicited full-list report, same layout as [`Action::SubDeviceList`] (inbound).
    SubDeviceListReport = 0x5C,
}

impl Action {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Action {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x10 => Ok(Self::SubDeviceStatus),
            0x56 => Ok(Self::AddSubDevice),
            0x57 => Ok(Self::AddSubDeviceAck),
            0x58 => Ok(Self::DeleteSubDevice),
            0x59 => Ok(Self::DeleteSubDeviceAck),
            0x5A => Ok(Self::GetSubDeviceList),
            0x5B => Ok(Self::SubDeviceList),
            0x5C => Ok(Self::SubDeviceListReport),
            other => Err(other),
        }
    }
}

/// Errors raised by the frame codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than the field being read requires.
    #[error("frame truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The remaining-length prefix has too many continuation bytes.
    #[error("remaining length prefix exceeds {max_bytes} bytes")]
    LengthOverflow { max_bytes: usize },

    /// The declared remaining length disagrees with the frame body.
    #[error("declared remaining length {declared} but {actual} bytes follow")]
    LengthMismatch { declared: usize, actual: usize },

    /// A field is too large for its wire width.
    #[error("{field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
