//! Hardware abstraction boundary.
//!
//! [`UcanHardware`] is the seam between session logic and an actual USB
//! transport. The session never touches USB directly; it drives whatever
//! implementation the [`HardwareOpener`] hands it. Tests run against the
//! in-memory adapter in [`mock`](crate::mock).

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use ucan_protocol::{CanStatus, Channel};

use crate::config::ChannelParams;

/// Which physical module to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// First module that answers enumeration.
    #[default]
    Any,
    /// Module with a specific rotary-switch device number.
    DeviceNumber(u8),
    /// Module with a specific serial number.
    Serial(u32),
}

/// Failures reported by a hardware backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("no device responded")]
    NotResponding,

    #[error("device already in use")]
    InUse,

    #[error("command rejected by adapter (code 0x{code:02X})")]
    Rejected { code: u8 },

    #[error("adapter busy")]
    Busy,

    #[error("hardware call timed out")]
    Timeout,

    #[error("device disconnected")]
    Disconnected,

    #[error("transport error: {0}")]
    Io(String),
}

impl HardwareError {
    /// Fatal errors terminate the session; everything else is retryable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HardwareError::Disconnected)
    }
}

/// Asynchronous notification pulled off the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEvent {
    /// The module finished (re)connecting.
    Connected,
    /// The module detached in an orderly fashion.
    Disconnected,
    /// The module vanished without deinitialization. Unrecoverable.
    FatalDisconnect,
    /// A raw receive record, still in wire encoding.
    Frame { channel: Channel, bytes: Bytes },
    /// The controller status word changed.
    Status { channel: Channel, status: CanStatus },
}

/// One open USB-CANmodul.
///
/// Implementations are driven from two threads at most: the session thread
/// for commands and the dispatcher thread for [`poll_event`]. Callers
/// serialize access externally, so `Send` without `Sync` suffices.
///
/// [`poll_event`]: UcanHardware::poll_event
pub trait UcanHardware: Send {
    /// Programs bitrate, mode, acceptance filter and queue sizes, then
    /// activates the channel.
    fn configure(&mut self, channel: Channel, params: &ChannelParams) -> Result<(), HardwareError>;

    /// Deactivates the channel and releases its queues.
    fn deconfigure(&mut self, channel: Channel) -> Result<(), HardwareError>;

    /// Queues one wire-encoded frame for transmission.
    fn send(&mut self, channel: Channel, frame: &[u8]) -> Result<(), HardwareError>;

    /// Blocks up to `timeout` for the next pending event.
    /// Returns [`HardwareError::Timeout`] when nothing arrived.
    fn poll_event(&mut self, timeout: Duration) -> Result<HardwareEvent, HardwareError>;

    /// Reads and clears the channel status word.
    fn status(&mut self, channel: Channel) -> Result<CanStatus, HardwareError>;

    /// Resets the CAN controller of an active channel, flushing its queues.
    fn reset(&mut self, channel: Channel) -> Result<(), HardwareError>;

    /// Reprograms the acceptance filter of an active channel.
    fn set_acceptance(&mut self, channel: Channel, amr: u32, acr: u32)
    -> Result<(), HardwareError>;

    /// Device number of the opened module.
    fn device_number(&self) -> u8;

    /// Releases the native handle. Must be idempotent.
    fn close(&mut self);
}

/// Factory for [`UcanHardware`] instances.
pub trait HardwareOpener: Send + Sync {
    fn open(&self, selector: DeviceSelector) -> Result<Box<dyn UcanHardware>, HardwareError>;
}
