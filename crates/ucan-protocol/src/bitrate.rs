//! Predefined CAN bitrates and their SJA1000 bus-timing register words.
//!
//! The adapter firmware takes the classic BTR0/BTR1 pair packed into one
//! 16-bit word (BTR0 in the high byte). Only the vendor-blessed table below
//! is accepted; arbitrary timing words are a firmware-update feature and are
//! not exposed here.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Supported nominal bitrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Bitrate {
    Rate1M = 0x0014,
    Rate800k = 0x0016,
    #[default]
    Rate500k = 0x001C,
    Rate250k = 0x011C,
    Rate125k = 0x031C,
    Rate100k = 0x432F,
    Rate50k = 0x472F,
    Rate20k = 0x532F,
    Rate10k = 0x672F,
}

impl Bitrate {
    /// Combined bus-timing word, BTR0 in the high byte and BTR1 in the low.
    pub fn btr(self) -> u16 {
        self.into()
    }

    pub fn btr0(self) -> u8 {
        (self.btr() >> 8) as u8
    }

    pub fn btr1(self) -> u8 {
        (self.btr() & 0xFF) as u8
    }

    /// Nominal bit frequency in bits per second.
    pub fn bits_per_sec(self) -> u32 {
        match self {
            Bitrate::Rate1M => 1_000_000,
            Bitrate::Rate800k => 800_000,
            Bitrate::Rate500k => 500_000,
            Bitrate::Rate250k => 250_000,
            Bitrate::Rate125k => 125_000,
            Bitrate::Rate100k => 100_000,
            Bitrate::Rate50k => 50_000,
            Bitrate::Rate20k => 20_000,
            Bitrate::Rate10k => 10_000,
        }
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bps = self.bits_per_sec();
        if bps >= 1_000_000 {
            write!(f, "{} MBit/s", bps / 1_000_000)
        } else {
            write!(f, "{} kBit/s", bps / 1_000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn btr_words_match_vendor_table() {
        assert_eq!(Bitrate::Rate1M.btr(), 0x0014);
        assert_eq!(Bitrate::Rate500k.btr(), 0x001C);
        assert_eq!(Bitrate::Rate125k.btr(), 0x031C);
        assert_eq!(Bitrate::Rate10k.btr(), 0x672F);
    }

    #[test]
    fn btr_bytes_split() {
        assert_eq!(Bitrate::Rate250k.btr0(), 0x01);
        assert_eq!(Bitrate::Rate250k.btr1(), 0x1C);
        assert_eq!(Bitrate::Rate100k.btr0(), 0x43);
        assert_eq!(Bitrate::Rate100k.btr1(), 0x2F);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(Bitrate::Rate1M.to_string(), "1 MBit/s");
        assert_eq!(Bitrate::Rate500k.to_string(), "500 kBit/s");
        assert_eq!(Bitrate::Rate20k.to_string(), "20 kBit/s");
    }

    #[test]
    fn rejects_arbitrary_timing_word() {
        assert!(Bitrate::try_from(0x1234u16).is_err());
    }
}
