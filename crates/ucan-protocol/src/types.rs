//! Adapter channel and operating-mode enums.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::ProtocolError;

/// Number of CAN channels a single module exposes.
pub const CHANNEL_COUNT: usize = 2;

/// One of the two CAN channels on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Channel {
    Ch0 = 0,
    Ch1 = 1,
}

impl Channel {
    /// Numeric index, usable for per-channel tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Fallible conversion that reports the offending raw value.
    pub fn from_raw(value: u8) -> Result<Self, ProtocolError> {
        Self::try_from(value).map_err(|_| ProtocolError::InvalidChannel { value })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.index())
    }
}

/// Channel operating mode, as programmed into the CAN controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OperatingMode {
    /// Transmit and receive normally.
    #[default]
    Normal = 0,
    /// Bus-passive monitoring, no acknowledge bits are generated.
    ListenOnly = 1,
    /// Successfully transmitted frames are reflected back on the receive path.
    TxEcho = 2,
}
