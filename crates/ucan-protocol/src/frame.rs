//! Host-side CAN message representation.

use std::fmt;

use crate::error::ProtocolError;

/// Maximum classic-CAN payload length.
pub const MAX_DATA_LEN: usize = 8;

/// Largest valid 11-bit identifier.
pub const STD_ID_MAX: u32 = 0x7FF;

/// Largest valid 29-bit identifier.
pub const EXT_ID_MAX: u32 = 0x1FFF_FFFF;

/// Identifier width of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameFormat {
    /// 11-bit identifier.
    #[default]
    Standard,
    /// 29-bit identifier.
    Extended,
}

impl FrameFormat {
    pub fn id_max(self) -> u32 {
        match self {
            FrameFormat::Standard => STD_ID_MAX,
            FrameFormat::Extended => EXT_ID_MAX,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFormat::Standard => write!(f, "standard"),
            FrameFormat::Extended => write!(f, "extended"),
        }
    }
}

/// A single CAN message.
///
/// Constructors validate identifier range and payload length, so a `CanMsg`
/// obtained through them is always serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanMsg {
    pub id: u32,
    pub format: FrameFormat,
    /// Remote transmission request. Remote frames carry a DLC but no payload.
    pub remote: bool,
    /// Set on received frames that echo a transmission of our own
    /// (only produced in [`OperatingMode::TxEcho`](crate::OperatingMode::TxEcho)).
    pub echo: bool,
    pub data: [u8; MAX_DATA_LEN],
    /// Number of valid bytes in `data` (the DLC for remote frames).
    pub len: u8,
    /// Receive timestamp in milliseconds of the adapter clock.
    /// Zero on messages built host-side.
    pub timestamp_ms: u32,
}

impl CanMsg {
    pub fn new(id: u32, format: FrameFormat, data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() > MAX_DATA_LEN {
            return Err(ProtocolError::DataTooLong { len: data.len() });
        }
        if id > format.id_max() {
            return Err(ProtocolError::IdOutOfRange { id, format });
        }

        let mut buf = [0u8; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);

        Ok(Self {
            id,
            format,
            remote: false,
            echo: false,
            data: buf,
            len: data.len() as u8,
            timestamp_ms: 0,
        })
    }

    /// Data frame with an 11-bit identifier.
    pub fn new_standard(id: u32, data: &[u8]) -> Result<Self, ProtocolError> {
        Self::new(id, FrameFormat::Standard, data)
    }

    /// Data frame with a 29-bit identifier.
    pub fn new_extended(id: u32, data: &[u8]) -> Result<Self, ProtocolError> {
        Self::new(id, FrameFormat::Extended, data)
    }

    /// Remote transmission request carrying `dlc` as the requested length.
    pub fn new_remote(id: u32, format: FrameFormat, dlc: u8) -> Result<Self, ProtocolError> {
        if dlc as usize > MAX_DATA_LEN {
            return Err(ProtocolError::DlcOutOfRange { dlc });
        }
        if id > format.id_max() {
            return Err(ProtocolError::IdOutOfRange { id, format });
        }

        Ok(Self {
            id,
            format,
            remote: true,
            echo: false,
            data: [0u8; MAX_DATA_LEN],
            len: dlc,
            timestamp_ms: 0,
        })
    }

    /// The valid portion of the payload.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn is_extended(&self) -> bool {
        self.format == FrameFormat::Extended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_standard_validates_id() {
        assert!(CanMsg::new_standard(0x7FF, &[1, 2, 3]).is_ok());
        assert_eq!(
            CanMsg::new_standard(0x800, &[]),
            Err(ProtocolError::IdOutOfRange {
                id: 0x800,
                format: FrameFormat::Standard,
            })
        );
    }

    #[test]
    fn new_extended_validates_id() {
        assert!(CanMsg::new_extended(EXT_ID_MAX, &[]).is_ok());
        assert!(CanMsg::new_extended(EXT_ID_MAX + 1, &[]).is_err());
    }

    #[test]
    fn payload_length_limited_to_eight() {
        let err = CanMsg::new_standard(0x100, &[0u8; 9]).unwrap_err();
        assert_eq!(err, ProtocolError::DataTooLong { len: 9 });
    }

    #[test]
    fn data_accessor_truncates_to_len() {
        let msg = CanMsg::new_standard(0x123, &[0xAA, 0xBB]).unwrap();
        assert_eq!(msg.data(), &[0xAA, 0xBB]);
        assert_eq!(msg.len, 2);
    }

    #[test]
    fn remote_frame_keeps_dlc_without_payload() {
        let msg = CanMsg::new_remote(0x42, FrameFormat::Standard, 4).unwrap();
        assert!(msg.remote);
        assert_eq!(msg.len, 4);
        assert_eq!(msg.data, [0u8; 8]);

        let err = CanMsg::new_remote(0x42, FrameFormat::Standard, 9).unwrap_err();
        assert_eq!(err, ProtocolError::DlcOutOfRange { dlc: 9 });
    }
}
