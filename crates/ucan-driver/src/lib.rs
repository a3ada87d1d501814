//! # ucan-driver
//!
//! Host-side driver for USB-CANmodul adapters: device session lifecycle,
//! per-channel configuration, ordered batch transmission and a background
//! event dispatcher with per-category callbacks.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use ucan_driver::{
//!     Bitrate, CanMsg, Channel, ChannelParams, SessionBuilder,
//!     mock::MockOpener,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let opener = MockOpener::new();
//! let mut session = SessionBuilder::new()
//!     .opener(Box::new(opener))
//!     .poll_timeout(Duration::from_millis(5))
//!     .build()?;
//!
//! session.init_hardware()?;
//! session.init_can(Channel::Ch0, ChannelParams::new(Bitrate::Rate500k))?;
//! session.on_message(|channel, msg| {
//!     println!("{channel}: id=0x{:X} {:?}", msg.id, msg.data());
//! });
//! session.start()?;
//!
//! let msg = CanMsg::new_standard(0x123, &[0x01, 0x02])?;
//! session.write_can_msg(Channel::Ch0, &[msg])?;
//! session.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! The crate ships no USB transport; a backend implements
//! [`hal::UcanHardware`] and is plugged in through the builder. The
//! [`mock`] backend drives the full stack in-memory for tests.

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod hal;
mod handle;
pub mod handlers;
pub mod mock;
pub mod session;

pub use builder::SessionBuilder;
pub use config::{ChannelParams, DEFAULT_BUFFER_ENTRIES};
pub use dispatcher::DispatcherState;
pub use error::{DriverError, WriteError};
pub use event::{ConnectionEvent, Event, EventCategory};
pub use hal::{DeviceSelector, HardwareError, HardwareEvent, HardwareOpener, UcanHardware};
pub use handle::HardwareHandle;
pub use session::{SessionState, UcanSession};

pub use ucan_protocol::{
    Bitrate, CanMsg, CanStatus, Channel, FrameFormat, OperatingMode, ProtocolError,
};
