//! Session construction.

use std::time::Duration;

use crate::error::DriverError;
use crate::hal::{DeviceSelector, HardwareOpener};
use crate::session::UcanSession;

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(5);

/// Builder for [`UcanSession`].
///
/// A hardware backend must be supplied through
/// [`opener`](SessionBuilder::opener); the crate ships no USB transport of
/// its own.
pub struct SessionBuilder {
    selector: DeviceSelector,
    poll_timeout: Duration,
    opener: Option<Box<dyn HardwareOpener>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            selector: DeviceSelector::Any,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            opener: None,
        }
    }

    /// Opens the module with this rotary-switch device number.
    pub fn device_number(mut self, device_number: u8) -> Self {
        self.selector = DeviceSelector::DeviceNumber(device_number);
        self
    }

    /// Opens the module with this serial number.
    pub fn serial(mut self, serial: u32) -> Self {
        self.selector = DeviceSelector::Serial(serial);
        self
    }

    /// Upper bound on one dispatcher poll. Shorter timeouts make stop
    /// requests and command calls more responsive at the cost of more
    /// wakeups.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn opener(mut self, opener: Box<dyn HardwareOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn build(self) -> Result<UcanSession, DriverError> {
        let opener = self.opener.ok_or_else(|| DriverError::InvalidParameter {
            reason: "no hardware backend supplied".into(),
        })?;
        if self.poll_timeout.is_zero() {
            return Err(DriverError::InvalidParameter {
                reason: "poll_timeout must be non-zero".into(),
            });
        }
        Ok(UcanSession::new(opener, self.selector, self.poll_timeout))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
