//! Handler registration table.
//!
//! One optional handler per event category, swappable at any time from any
//! thread. The dispatcher clones the table (cheap `Arc` clones) under a
//! short read lock and invokes handlers with no lock held, so a handler may
//! itself register or clear handlers. A registration takes effect from the
//! next event onward and is never applied retroactively.

use std::sync::Arc;

use ucan_protocol::{CanMsg, CanStatus, Channel};

use crate::error::DriverError;
use crate::event::{ConnectionEvent, Event, EventCategory};

pub type ConnectionHandler = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(Channel, &CanMsg) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(Channel, CanStatus) + Send + Sync>;
pub type DispatchErrorHandler = Arc<dyn Fn(&DriverError) + Send + Sync>;

#[derive(Clone, Default)]
pub struct HandlerTable {
    on_connection: Option<ConnectionHandler>,
    on_message: Option<MessageHandler>,
    on_error: Option<ErrorHandler>,
    on_dispatch_error: Option<DispatchErrorHandler>,
}

impl HandlerTable {
    pub const fn new() -> Self {
        Self {
            on_connection: None,
            on_message: None,
            on_error: None,
            on_dispatch_error: None,
        }
    }

    pub fn set_connection(&mut self, handler: Option<ConnectionHandler>) {
        self.on_connection = handler;
    }

    pub fn set_message(&mut self, handler: Option<MessageHandler>) {
        self.on_message = handler;
    }

    pub fn set_error(&mut self, handler: Option<ErrorHandler>) {
        self.on_error = handler;
    }

    pub fn set_dispatch_error(&mut self, handler: Option<DispatchErrorHandler>) {
        self.on_dispatch_error = handler;
    }

    pub fn has(&self, category: EventCategory) -> bool {
        match category {
            EventCategory::Connection => self.on_connection.is_some(),
            EventCategory::Message => self.on_message.is_some(),
            EventCategory::Error => self.on_error.is_some(),
        }
    }

    /// Routes `event` to its handler. Returns `false` when no handler is
    /// registered for the category, in which case the event is dropped.
    pub fn dispatch(&self, event: &Event) -> bool {
        match event {
            Event::ConnectionStateChanged(transition) => {
                if let Some(handler) = &self.on_connection {
                    handler(*transition);
                    return true;
                }
            }
            Event::MessageReceived { channel, msg } => {
                if let Some(handler) = &self.on_message {
                    handler(*channel, msg);
                    return true;
                }
            }
            Event::ErrorOccurred { channel, status } => {
                if let Some(handler) = &self.on_error {
                    handler(*channel, *status);
                    return true;
                }
            }
        }
        false
    }

    /// Reports a handler failure. Returns `false` when no failure handler
    /// is registered.
    pub fn report_dispatch_error(&self, err: &DriverError) -> bool {
        if let Some(handler) = &self.on_dispatch_error {
            handler(err);
            true
        } else {
            false
        }
    }
}
