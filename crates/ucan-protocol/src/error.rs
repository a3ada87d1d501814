//! Protocol-level error definitions.

use thiserror::Error;

use crate::frame::FrameFormat;

/// Errors raised while constructing or (de)serializing CAN frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("CAN payload too long: {len} bytes (max 8)")]
    DataTooLong { len: usize },

    #[error("CAN id 0x{id:X} out of range for {format} frame")]
    IdOutOfRange { id: u32, format: FrameFormat },

    #[error("DLC {dlc} out of range (max 8)")]
    DlcOutOfRange { dlc: u8 },

    #[error("reserved frame-format bits set: 0x{flags:02X}")]
    ReservedFlags { flags: u8 },

    #[error("frame too short: {len} bytes (expected {expected})")]
    FrameTooShort { len: usize, expected: usize },

    #[error("invalid CAN channel: {value}")]
    InvalidChannel { value: u8 },
}
