//! Bulk-endpoint frame codec.
//!
//! Every CAN message crosses the USB pipe as one fixed 18-byte record,
//! little-endian throughout:
//!
//! ```text
//! offset  size  field
//! 0       4     identifier
//! 4       1     frame-format flags
//! 5       1     DLC
//! 6       8     payload (padded with zeros)
//! 14      4     timestamp, milliseconds
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::frame::{CanMsg, FrameFormat, MAX_DATA_LEN};

/// Size of one record on the wire.
pub const WIRE_FRAME_SIZE: usize = 18;

/// Frame-format flag: 29-bit identifier.
pub const FF_EXTENDED: u8 = 0x80;
/// Frame-format flag: remote transmission request.
pub const FF_REMOTE: u8 = 0x40;
/// Frame-format flag: local TX echo.
pub const FF_ECHO: u8 = 0x20;
/// Bits the firmware does not define. A set bit here means a corrupt record.
pub const FF_RESERVED_MASK: u8 = 0x1F;

/// Serializes `msg` into `dst`, appending exactly [`WIRE_FRAME_SIZE`] bytes.
pub fn encode_msg(msg: &CanMsg, dst: &mut BytesMut) {
    dst.reserve(WIRE_FRAME_SIZE);
    dst.put_u32_le(msg.id);

    let mut ff = 0u8;
    if msg.format == FrameFormat::Extended {
        ff |= FF_EXTENDED;
    }
    if msg.remote {
        ff |= FF_REMOTE;
    }
    if msg.echo {
        ff |= FF_ECHO;
    }
    dst.put_u8(ff);
    dst.put_u8(msg.len);
    dst.put_slice(&msg.data);
    dst.put_u32_le(msg.timestamp_ms);
}

/// Parses one record from `src`. Trailing bytes beyond the first record
/// are ignored.
pub fn decode_msg(src: &[u8]) -> Result<CanMsg, ProtocolError> {
    if src.len() < WIRE_FRAME_SIZE {
        return Err(ProtocolError::FrameTooShort {
            len: src.len(),
            expected: WIRE_FRAME_SIZE,
        });
    }

    let mut buf = src;
    let id = buf.get_u32_le();
    let ff = buf.get_u8();
    let dlc = buf.get_u8();

    if ff & FF_RESERVED_MASK != 0 {
        return Err(ProtocolError::ReservedFlags {
            flags: ff & FF_RESERVED_MASK,
        });
    }
    if dlc as usize > MAX_DATA_LEN {
        return Err(ProtocolError::DlcOutOfRange { dlc });
    }

    let format = if ff & FF_EXTENDED != 0 {
        FrameFormat::Extended
    } else {
        FrameFormat::Standard
    };
    if id > format.id_max() {
        return Err(ProtocolError::IdOutOfRange { id, format });
    }

    let mut data = [0u8; MAX_DATA_LEN];
    buf.copy_to_slice(&mut data);
    let timestamp_ms = buf.get_u32_le();

    Ok(CanMsg {
        id,
        format,
        remote: ff & FF_REMOTE != 0,
        echo: ff & FF_ECHO != 0,
        data,
        len: dlc,
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(msg: &CanMsg) -> BytesMut {
        let mut buf = BytesMut::with_capacity(WIRE_FRAME_SIZE);
        encode_msg(msg, &mut buf);
        buf
    }

    #[test]
    fn encode_layout_is_little_endian() {
        let mut msg = CanMsg::new_standard(0x123, &[0xDE, 0xAD]).unwrap();
        msg.timestamp_ms = 0x0102_0304;
        let buf = encoded(&msg);

        assert_eq!(buf.len(), WIRE_FRAME_SIZE);
        assert_eq!(&buf[0..4], &[0x23, 0x01, 0x00, 0x00]);
        assert_eq!(buf[4], 0x00);
        assert_eq!(buf[5], 2);
        assert_eq!(&buf[6..8], &[0xDE, 0xAD]);
        assert_eq!(&buf[8..14], &[0u8; 6]);
        assert_eq!(&buf[14..18], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn extended_and_remote_flags() {
        let msg = CanMsg::new_remote(0x1ABCDE, FrameFormat::Extended, 3).unwrap();
        let buf = encoded(&msg);
        assert_eq!(buf[4], FF_EXTENDED | FF_REMOTE);
        assert_eq!(buf[5], 3);
    }

    #[test]
    fn decode_roundtrip() {
        let mut msg = CanMsg::new_extended(0x1577_1234, &[1, 2, 3, 4, 5]).unwrap();
        msg.timestamp_ms = 42_000;
        let buf = encoded(&msg);

        let decoded = decode_msg(&buf).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_rejects_short_record() {
        let err = decode_msg(&[0u8; 17]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FrameTooShort {
                len: 17,
                expected: WIRE_FRAME_SIZE,
            }
        );
    }

    #[test]
    fn decode_rejects_reserved_flag_bits() {
        let msg = CanMsg::new_standard(0x10, &[]).unwrap();
        let mut buf = encoded(&msg);
        buf[4] |= 0x01;
        assert_eq!(
            decode_msg(&buf).unwrap_err(),
            ProtocolError::ReservedFlags { flags: 0x01 }
        );
    }

    #[test]
    fn decode_rejects_oversized_dlc() {
        let msg = CanMsg::new_standard(0x10, &[]).unwrap();
        let mut buf = encoded(&msg);
        buf[5] = 12;
        assert_eq!(
            decode_msg(&buf).unwrap_err(),
            ProtocolError::DlcOutOfRange { dlc: 12 }
        );
    }

    #[test]
    fn decode_rejects_standard_id_overflow() {
        // wide identifier with the extended bit cleared
        let mut buf = BytesMut::new();
        buf.put_u32_le(0x1000);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_slice(&[0u8; 8]);
        buf.put_u32_le(0);

        assert_eq!(
            decode_msg(&buf).unwrap_err(),
            ProtocolError::IdOutOfRange {
                id: 0x1000,
                format: FrameFormat::Standard,
            }
        );
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let msg = CanMsg::new_standard(0x55, &[9]).unwrap();
        let mut buf = encoded(&msg);
        buf.extend_from_slice(&[0xFF; 4]);
        assert_eq!(decode_msg(&buf).unwrap(), msg);
    }
}
