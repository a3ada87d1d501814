//! Driver-level error taxonomy.

use thiserror::Error;

use ucan_protocol::{CanMsg, Channel, ProtocolError};

use crate::hal::HardwareError;
use crate::session::SessionState;

/// Errors surfaced by session and channel operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// No adapter answered, or the adapter vanished mid-operation.
    #[error("USB-CAN hardware unavailable")]
    HardwareUnavailable,

    /// The selected device is already claimed by another session.
    #[error("device already opened by another session")]
    AlreadyOpen,

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    /// The channel is active and must be deactivated before reconfiguration.
    #[error("channel {channel} is busy")]
    ChannelBusy { channel: Channel },

    /// The adapter refused a structurally valid request.
    #[error("request rejected by adapter (code 0x{code:02X})")]
    HardwareRejected { code: u8 },

    /// Traffic was attempted on a channel that is not configured and active.
    #[error("channel {channel} is not ready")]
    ChannelNotReady { channel: Channel },

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] ProtocolError),

    #[error("hardware call timed out")]
    Timeout,

    /// The operation is not legal in the session's current state.
    #[error("operation not allowed while session is {state:?}")]
    InvalidState { state: SessionState },

    /// A registered event handler failed while being invoked.
    #[error("event handler failed: {0}")]
    Dispatch(String),
}

impl From<HardwareError> for DriverError {
    fn from(err: HardwareError) -> Self {
        match err {
            HardwareError::NotResponding
            | HardwareError::Disconnected
            | HardwareError::Io(_) => DriverError::HardwareUnavailable,
            HardwareError::InUse => DriverError::AlreadyOpen,
            HardwareError::Rejected { code } => DriverError::HardwareRejected { code },
            HardwareError::Busy | HardwareError::Timeout => DriverError::Timeout,
        }
    }
}

/// Failure while writing a batch of messages, carrying how far the batch got.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("wrote {sent} of {total} CAN messages: {source}")]
pub struct WriteError {
    /// Messages accepted by the adapter before the failure.
    pub sent: usize,
    /// Size of the submitted batch.
    pub total: usize,
    /// The message that failed, when the failure was per-message.
    pub failed: Option<CanMsg>,
    #[source]
    pub source: DriverError,
}
