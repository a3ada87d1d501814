//! RAII ownership of one native adapter handle.
//!
//! A process-wide registry tracks which device numbers are claimed so two
//! sessions cannot open the same module, and reference-counts live handles
//! so shared library state is set up on the first open and torn down after
//! the last release.

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::DriverError;
use crate::hal::{DeviceSelector, HardwareError, HardwareOpener, UcanHardware};

struct ClaimRegistry {
    live_handles: usize,
    claimed: Vec<u8>,
}

impl ClaimRegistry {
    const fn new() -> Self {
        Self {
            live_handles: 0,
            claimed: Vec::new(),
        }
    }
}

static REGISTRY: Mutex<ClaimRegistry> = Mutex::new(ClaimRegistry::new());

/// Owned, claimed adapter handle. Dropping it releases the claim.
pub struct HardwareHandle {
    hw: Option<Box<dyn UcanHardware>>,
    device_number: u8,
}

impl HardwareHandle {
    /// Opens the module selected by `selector` and claims it for this
    /// process. Fails with [`DriverError::AlreadyOpen`] when the module is
    /// already claimed, here or by the backend itself.
    pub fn acquire(
        opener: &dyn HardwareOpener,
        selector: DeviceSelector,
    ) -> Result<Self, DriverError> {
        // Fast-path claim check when the caller already knows the number.
        if let DeviceSelector::DeviceNumber(n) = selector
            && REGISTRY.lock().claimed.contains(&n)
        {
            return Err(DriverError::AlreadyOpen);
        }

        let hw = opener.open(selector).map_err(|err| match err {
            HardwareError::NotResponding | HardwareError::Timeout => {
                DriverError::HardwareUnavailable
            }
            other => DriverError::from(other),
        })?;
        let device_number = hw.device_number();

        let mut registry = REGISTRY.lock();
        if registry.claimed.contains(&device_number) {
            let mut hw = hw;
            hw.close();
            return Err(DriverError::AlreadyOpen);
        }
        if registry.live_handles == 0 {
            debug!("first adapter handle, initializing shared driver state");
        }
        registry.live_handles += 1;
        registry.claimed.push(device_number);
        trace!(device_number, "adapter handle acquired");

        Ok(Self {
            hw: Some(hw),
            device_number,
        })
    }

    pub fn device_number(&self) -> u8 {
        self.device_number
    }

    /// Mutable access to the backend. Panics after `release`, which the
    /// session state machine rules out.
    pub fn hardware(&mut self) -> &mut dyn UcanHardware {
        self.hw
            .as_mut()
            .map(|hw| hw.as_mut())
            .unwrap_or_else(|| unreachable!("handle used after release"))
    }

    pub fn is_released(&self) -> bool {
        self.hw.is_none()
    }

    /// Closes the native handle and drops the claim. Idempotent.
    pub fn release(&mut self) {
        let Some(mut hw) = self.hw.take() else {
            return;
        };
        hw.close();

        let mut registry = REGISTRY.lock();
        registry.claimed.retain(|&n| n != self.device_number);
        registry.live_handles = registry.live_handles.saturating_sub(1);
        if registry.live_handles == 0 {
            debug!("last adapter handle released, tearing down shared driver state");
        }
        trace!(device_number = self.device_number, "adapter handle released");
    }
}

impl Drop for HardwareHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOpener;

    // Each test uses a distinct device number; the registry is process-wide
    // and tests run in parallel.

    #[test]
    fn acquire_release_cycle() {
        let opener = MockOpener::with_device_number(101);
        let mut handle =
            HardwareHandle::acquire(&opener, DeviceSelector::DeviceNumber(101)).unwrap();
        assert_eq!(handle.device_number(), 101);
        assert!(!handle.is_released());

        handle.release();
        assert!(handle.is_released());
        handle.release();
        assert!(opener.controller().is_closed());
    }

    #[test]
    fn double_acquire_rejected_until_release() {
        let opener = MockOpener::with_device_number(102);
        let handle = HardwareHandle::acquire(&opener, DeviceSelector::Any).unwrap();

        let second = HardwareHandle::acquire(&opener, DeviceSelector::Any);
        assert!(matches!(second, Err(DriverError::AlreadyOpen)));

        drop(handle);
        let reacquired = HardwareHandle::acquire(&opener, DeviceSelector::Any);
        assert!(reacquired.is_ok());
    }

    #[test]
    fn claimed_device_number_rejected_before_open() {
        let opener = MockOpener::with_device_number(103);
        let _handle = HardwareHandle::acquire(&opener, DeviceSelector::Any).unwrap();

        let other = MockOpener::with_device_number(103);
        let second = HardwareHandle::acquire(&other, DeviceSelector::DeviceNumber(103));
        assert!(matches!(second, Err(DriverError::AlreadyOpen)));
        // the fast path rejects before the opener runs
        assert_eq!(other.controller().open_calls(), 0);
    }

    #[test]
    fn open_failure_maps_to_unavailable() {
        let opener = MockOpener::with_device_number(104);
        opener.controller().fail_next_open(HardwareError::NotResponding);
        let result = HardwareHandle::acquire(&opener, DeviceSelector::Any);
        assert!(matches!(result, Err(DriverError::HardwareUnavailable)));
    }
}
