//! Acceptance-filter register math.
//!
//! The CAN controller filters incoming frames with a mask register (AMR)
//! and a code register (ACR). An AMR bit of 1 marks the corresponding
//! identifier bit as "don't care"; a 0 requires it to match the ACR.
//! Standard identifiers sit in the top 11 bits of the register pair,
//! extended identifiers in the top 29, with the RTR bit directly below
//! the identifier in both layouts.

/// Mask accepting every identifier.
pub const AMR_ALL: u32 = 0xFFFF_FFFF;

/// Code register matching everything when paired with [`AMR_ALL`].
pub const ACR_ALL: u32 = 0x0000_0000;

use crate::frame::{EXT_ID_MAX, STD_ID_MAX};

fn id_mask(extended: bool) -> u32 {
    if extended { EXT_ID_MAX } else { STD_ID_MAX }
}

/// Computes the acceptance mask covering the identifier range
/// `from_id..=to_id`. Identifier bits beyond the format's width are
/// ignored.
///
/// With `rtr_only` set, only remote frames pass. With `rtr_too` set, both
/// data and remote frames pass; otherwise remote frames are filtered out.
pub fn calculate_amr(extended: bool, from_id: u32, to_id: u32, rtr_only: bool, rtr_too: bool) -> u32 {
    let mask = id_mask(extended);
    let dont_care = (from_id ^ to_id) & mask;
    if extended {
        (dont_care << 3) | if rtr_too && !rtr_only { 0x0007 } else { 0x0003 }
    } else {
        (dont_care << 21) | if rtr_too && !rtr_only { 0x001F_FFFF } else { 0x000F_FFFF }
    }
}

/// Computes the acceptance code matching [`calculate_amr`] for the same
/// identifier range.
pub fn calculate_acr(extended: bool, from_id: u32, to_id: u32, rtr_only: bool) -> u32 {
    let mask = id_mask(extended);
    let fixed = from_id & to_id & mask;
    if extended {
        (fixed << 3) | if rtr_only { 0x0000_0004 } else { 0 }
    } else {
        (fixed << 21) | if rtr_only { 0x0010_0000 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_filter_constants() {
        assert_eq!(AMR_ALL, u32::MAX);
        assert_eq!(ACR_ALL, 0);
    }

    #[test]
    fn single_standard_id() {
        // a one-id range has no "don't care" identifier bits
        let amr = calculate_amr(false, 0x123, 0x123, false, false);
        let acr = calculate_acr(false, 0x123, 0x123, false);
        assert_eq!(amr, 0x000F_FFFF);
        assert_eq!(acr, 0x123 << 21);
    }

    #[test]
    fn standard_range_sets_xor_bits() {
        let amr = calculate_amr(false, 0x100, 0x10F, false, true);
        assert_eq!(amr, (0x00F << 21) | 0x001F_FFFF);
        let acr = calculate_acr(false, 0x100, 0x10F, false);
        assert_eq!(acr, 0x100 << 21);
    }

    #[test]
    fn extended_layout_shifts_by_three() {
        let amr = calculate_amr(true, 0x1000, 0x1003, false, false);
        assert_eq!(amr, (0x3 << 3) | 0x3);
        let acr = calculate_acr(true, 0x1000, 0x1003, false);
        assert_eq!(acr, 0x1000 << 3);
    }

    #[test]
    fn standard_math_ignores_bits_beyond_eleven() {
        // ids wider than the format must not overflow the shift
        let amr = calculate_amr(false, 0xFFFF_F123, 0xFFFF_F123, false, false);
        assert_eq!(amr, calculate_amr(false, 0x123, 0x123, false, false));
        let acr = calculate_acr(false, 0xFFFF_F123, 0xFFFF_F123, false);
        assert_eq!(acr, 0x123 << 21);
    }

    #[test]
    fn extended_math_ignores_bits_beyond_twentynine() {
        let acr = calculate_acr(true, 0xFFFF_FFFF, 0xFFFF_FFFF, false);
        assert_eq!(acr, 0x1FFF_FFFF << 3);
    }

    #[test]
    fn rtr_only_forces_rtr_bit_match() {
        let amr = calculate_amr(false, 0x7FF, 0x7FF, true, true);
        assert_eq!(amr, 0x000F_FFFF);
        let acr = calculate_acr(false, 0x7FF, 0x7FF, true);
        assert_eq!(acr, (0x7FF << 21) | 0x0010_0000);
    }
}
