//! Decoded events delivered to registered handlers.

use ucan_protocol::{CanMsg, CanStatus, Channel};

/// Connection-level transition of the module itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    /// The module vanished without deinitialization. The session is closed
    /// by the time handlers observe this.
    FatalDisconnect,
}

/// Routing category of an event, one handler slot per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Connection,
    Message,
    Error,
}

/// A decoded, dispatchable event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConnectionStateChanged(ConnectionEvent),
    MessageReceived { channel: Channel, msg: CanMsg },
    ErrorOccurred { channel: Channel, status: CanStatus },
}

impl Event {
    pub fn category(&self) -> EventCategory {
        match self {
            Event::ConnectionStateChanged(_) => EventCategory::Connection,
            Event::MessageReceived { .. } => EventCategory::Message,
            Event::ErrorOccurred { .. } => EventCategory::Error,
        }
    }
}
