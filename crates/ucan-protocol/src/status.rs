//! CAN controller status word.

use std::fmt;

/// Bitfield reported by the adapter for one channel.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CanStatus(pub u16);

impl CanStatus {
    pub const OK: u16 = 0x0000;
    /// Transmit buffer in the controller is full.
    pub const XMTFULL: u16 = 0x0001;
    /// Receive overrun in the controller.
    pub const OVERRUN: u16 = 0x0002;
    /// Error warning limit reached.
    pub const BUSLIGHT: u16 = 0x0004;
    /// Error passive.
    pub const BUSHEAVY: u16 = 0x0008;
    /// Controller went bus-off.
    pub const BUSOFF: u16 = 0x0010;
    /// Receive queue is empty.
    pub const QRCVEMPTY: u16 = 0x0020;
    /// Receive queue overrun, frames were lost.
    pub const QOVERRUN: u16 = 0x0040;
    /// Transmit queue is full.
    pub const QXMTFULL: u16 = 0x0080;
    /// Register test failed.
    pub const REGTEST: u16 = 0x0100;
    /// Memory test failed.
    pub const MEMTEST: u16 = 0x0200;
    /// A transmit message was dropped.
    pub const TXMSGLOST: u16 = 0x0400;

    pub fn is_ok(self) -> bool {
        self.0 == Self::OK
    }

    pub fn contains(self, bits: u16) -> bool {
        self.0 & bits != 0
    }

    pub fn bus_off(self) -> bool {
        self.contains(Self::BUSOFF)
    }

    pub fn error_passive(self) -> bool {
        self.contains(Self::BUSHEAVY)
    }

    pub fn warning_limit(self) -> bool {
        self.contains(Self::BUSLIGHT)
    }

    pub fn rx_overrun(self) -> bool {
        self.contains(Self::OVERRUN | Self::QOVERRUN)
    }

    /// Human-readable summary of every set bit.
    pub fn describe(self) -> String {
        const NAMES: &[(u16, &str)] = &[
            (CanStatus::XMTFULL, "transmit buffer full"),
            (CanStatus::OVERRUN, "receive overrun"),
            (CanStatus::BUSLIGHT, "warning limit reached"),
            (CanStatus::BUSHEAVY, "error passive"),
            (CanStatus::BUSOFF, "bus-off"),
            (CanStatus::QRCVEMPTY, "receive queue empty"),
            (CanStatus::QOVERRUN, "receive queue overrun"),
            (CanStatus::QXMTFULL, "transmit queue full"),
            (CanStatus::REGTEST, "register test failed"),
            (CanStatus::MEMTEST, "memory test failed"),
            (CanStatus::TXMSGLOST, "transmit message lost"),
        ];

        if self.is_ok() {
            return "OK".to_string();
        }

        let mut parts = Vec::new();
        for &(bit, name) in NAMES {
            if self.contains(bit) {
                parts.push(name);
            }
        }
        parts.join(", ")
    }
}

impl fmt::Debug for CanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanStatus(0x{:04X}: {})", self.0, self.describe())
    }
}

impl fmt::Display for CanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
