//! # ucan-protocol
//!
//! Wire-level building blocks for USB-CANmodul adapters: the host-side
//! frame type, the fixed 18-byte bulk-endpoint codec, the vendor bitrate
//! table, acceptance-filter register math, and the controller status word.
//!
//! This crate is I/O-free. Everything that touches a device lives in
//! `ucan-driver`.

pub mod acceptance;
pub mod bitrate;
pub mod error;
pub mod frame;
pub mod status;
pub mod types;
pub mod wire;

pub use acceptance::{ACR_ALL, AMR_ALL, calculate_acr, calculate_amr};
pub use bitrate::Bitrate;
pub use error::ProtocolError;
pub use frame::{CanMsg, EXT_ID_MAX, FrameFormat, MAX_DATA_LEN, STD_ID_MAX};
pub use status::CanStatus;
pub use types::{CHANNEL_COUNT, Channel, OperatingMode};
pub use wire::{WIRE_FRAME_SIZE, decode_msg, encode_msg};
