//! Per-channel configuration.

use ucan_protocol::{ACR_ALL, AMR_ALL, Bitrate, OperatingMode};

use crate::error::DriverError;

/// Default depth of the receive and transmit queues, in frames.
pub const DEFAULT_BUFFER_ENTRIES: u16 = 4096;

/// Everything needed to bring one CAN channel up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelParams {
    pub bitrate: Bitrate,
    pub mode: OperatingMode,
    /// Acceptance mask register. Defaults to accept-all.
    pub amr: u32,
    /// Acceptance code register. Defaults to accept-all.
    pub acr: u32,
    pub rx_buffer_entries: u16,
    pub tx_buffer_entries: u16,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self::new(Bitrate::default())
    }
}

impl ChannelParams {
    pub fn new(bitrate: Bitrate) -> Self {
        Self {
            bitrate,
            mode: OperatingMode::Normal,
            amr: AMR_ALL,
            acr: ACR_ALL,
            rx_buffer_entries: DEFAULT_BUFFER_ENTRIES,
            tx_buffer_entries: DEFAULT_BUFFER_ENTRIES,
        }
    }

    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_acceptance(mut self, amr: u32, acr: u32) -> Self {
        self.amr = amr;
        self.acr = acr;
        self
    }

    pub fn with_buffer_entries(mut self, rx: u16, tx: u16) -> Self {
        self.rx_buffer_entries = rx;
        self.tx_buffer_entries = tx;
        self
    }

    /// Checks everything that can be checked without touching hardware.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.rx_buffer_entries == 0 {
            return Err(DriverError::InvalidParameter {
                reason: "rx_buffer_entries must be non-zero".into(),
            });
        }
        if self.tx_buffer_entries == 0 {
            return Err(DriverError::InvalidParameter {
                reason: "tx_buffer_entries must be non-zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_accept_everything() {
        let params = ChannelParams::default();
        assert_eq!(params.bitrate, Bitrate::Rate500k);
        assert_eq!(params.mode, OperatingMode::Normal);
        assert_eq!(params.amr, AMR_ALL);
        assert_eq!(params.acr, ACR_ALL);
        assert_eq!(params.rx_buffer_entries, DEFAULT_BUFFER_ENTRIES);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn zero_buffer_entries_rejected() {
        let params = ChannelParams::default().with_buffer_entries(0, 16);
        assert!(matches!(
            params.validate(),
            Err(DriverError::InvalidParameter { .. })
        ));

        let params = ChannelParams::default().with_buffer_entries(16, 0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn builder_style_setters() {
        let params = ChannelParams::new(Bitrate::Rate125k)
            .with_mode(OperatingMode::ListenOnly)
            .with_acceptance(0x00FF_FFFF, 0x1230_0000);
        assert_eq!(params.bitrate, Bitrate::Rate125k);
        assert_eq!(params.mode, OperatingMode::ListenOnly);
        assert_eq!(params.amr, 0x00FF_FFFF);
        assert_eq!(params.acr, 0x1230_0000);
    }
}
