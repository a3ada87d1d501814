//! Device session and lifecycle state machine.
//!
//! [`UcanSession`] owns the adapter handle, the per-channel configuration
//! and the event dispatcher. All state lives behind one mutex, so command
//! calls are safe from any thread; the dispatcher thread shares the same
//! lock for its bounded polls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use ucan_protocol::{CanMsg, CanStatus, Channel, MAX_DATA_LEN, encode_msg};

use crate::config::ChannelParams;
use crate::dispatcher::{DispatcherState, EventDispatcher};
use crate::error::{DriverError, WriteError};
use crate::event::ConnectionEvent;
use crate::hal::{DeviceSelector, HardwareError, HardwareOpener};
use crate::handle::HardwareHandle;
use crate::handlers::HandlerTable;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No hardware claimed yet.
    Uninitialized,
    /// Adapter handle acquired, no channel configured.
    HardwareReady,
    /// At least one channel configured and active.
    ChannelsReady,
    /// Dispatcher running, traffic flowing.
    Running,
    /// Teardown in progress.
    ShuttingDown,
    /// Terminal. Reached by `shutdown` or by a fatal hardware failure.
    Closed,
}

pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    /// Set when the device vanished without deinitialization.
    pub(crate) fatal: bool,
    pub(crate) handle: Option<HardwareHandle>,
    pub(crate) channels: HashMap<Channel, ChannelParams>,
}

impl SessionInner {
    pub(crate) fn channel_active(&self, channel: Channel) -> bool {
        self.channels.contains_key(&channel)
    }
}

pub(crate) struct SessionShared {
    pub(crate) inner: Mutex<SessionInner>,
    pub(crate) handlers: RwLock<HandlerTable>,
}

/// A session with one USB-CANmodul.
///
/// Built through [`SessionBuilder`](crate::SessionBuilder). Dropping the
/// session performs a full [`shutdown`](UcanSession::shutdown).
pub struct UcanSession {
    shared: Arc<SessionShared>,
    opener: Box<dyn HardwareOpener>,
    selector: DeviceSelector,
    poll_timeout: Duration,
    dispatcher: Option<EventDispatcher>,
}

impl core::fmt::Debug for UcanSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UcanSession")
            .field("selector", &self.selector)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl UcanSession {
    pub(crate) fn new(
        opener: Box<dyn HardwareOpener>,
        selector: DeviceSelector,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                inner: Mutex::new(SessionInner {
                    state: SessionState::Uninitialized,
                    fatal: false,
                    handle: None,
                    channels: HashMap::new(),
                }),
                handlers: RwLock::new(HandlerTable::new()),
            }),
            opener,
            selector,
            poll_timeout,
            dispatcher: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    pub fn dispatcher_state(&self) -> DispatcherState {
        self.dispatcher
            .as_ref()
            .map(EventDispatcher::state)
            .unwrap_or(DispatcherState::Idle)
    }

    /// Device number of the claimed module, once hardware is initialized.
    pub fn device_number(&self) -> Option<u8> {
        self.shared
            .inner
            .lock()
            .handle
            .as_ref()
            .map(HardwareHandle::device_number)
    }

    /// Claims the adapter selected at build time.
    ///
    /// Idempotent: calling again while hardware is already claimed is a
    /// no-op. Fails with [`DriverError::AlreadyOpen`] when another session
    /// holds the module.
    pub fn init_hardware(&mut self) -> Result<(), DriverError> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            SessionState::Uninitialized => {}
            SessionState::HardwareReady
            | SessionState::ChannelsReady
            | SessionState::Running => return Ok(()),
            SessionState::Closed if inner.fatal => return Err(DriverError::HardwareUnavailable),
            state => return Err(DriverError::InvalidState { state }),
        }

        let handle = HardwareHandle::acquire(self.opener.as_ref(), self.selector)?;
        info!(device_number = handle.device_number(), "hardware initialized");
        inner.handle = Some(handle);
        inner.state = SessionState::HardwareReady;
        Ok(())
    }

    /// Configures and activates one CAN channel.
    ///
    /// An already-active channel is rejected with
    /// [`DriverError::ChannelBusy`]; deactivate it with
    /// [`deinit_can`](UcanSession::deinit_can) before reconfiguring.
    pub fn init_can(&mut self, channel: Channel, params: ChannelParams) -> Result<(), DriverError> {
        params.validate()?;

        let mut inner = self.shared.inner.lock();
        match inner.state {
            SessionState::HardwareReady | SessionState::ChannelsReady => {}
            state => return Err(DriverError::InvalidState { state }),
        }
        if inner.channel_active(channel) {
            return Err(DriverError::ChannelBusy { channel });
        }

        let handle = inner.handle.as_mut().ok_or(DriverError::HardwareUnavailable)?;
        handle
            .hardware()
            .configure(channel, &params)
            .map_err(|err| match err {
                HardwareError::Busy => DriverError::ChannelBusy { channel },
                other => DriverError::from(other),
            })?;

        info!(%channel, bitrate = %params.bitrate, mode = ?params.mode, "channel initialized");
        inner.channels.insert(channel, params);
        inner.state = SessionState::ChannelsReady;
        Ok(())
    }

    /// Deactivates one channel so it can be reconfigured.
    pub fn deinit_can(&mut self, channel: Channel) -> Result<(), DriverError> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            SessionState::ChannelsReady | SessionState::Running => {}
            state => return Err(DriverError::InvalidState { state }),
        }
        if !inner.channel_active(channel) {
            return Err(DriverError::ChannelNotReady { channel });
        }

        let handle = inner.handle.as_mut().ok_or(DriverError::HardwareUnavailable)?;
        handle.hardware().deconfigure(channel).map_err(DriverError::from)?;
        inner.channels.remove(&channel);
        debug!(%channel, "channel deinitialized");

        if inner.channels.is_empty() && inner.state == SessionState::ChannelsReady {
            inner.state = SessionState::HardwareReady;
        }
        Ok(())
    }

    /// Starts the event dispatcher. Idempotent while running.
    pub fn start(&mut self) -> Result<(), DriverError> {
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                SessionState::ChannelsReady => inner.state = SessionState::Running,
                SessionState::Running => return Ok(()),
                state => return Err(DriverError::InvalidState { state }),
            }
        }

        match EventDispatcher::start(self.shared.clone(), self.poll_timeout) {
            Ok(dispatcher) => {
                self.dispatcher = Some(dispatcher);
                info!("session running");
                Ok(())
            }
            Err(err) => {
                self.shared.inner.lock().state = SessionState::ChannelsReady;
                Err(err)
            }
        }
    }

    /// Queues a batch of messages for transmission, preserving order.
    ///
    /// On failure the error reports how many messages the adapter accepted
    /// before the batch stopped.
    pub fn write_can_msg(
        &self,
        channel: Channel,
        messages: &[CanMsg],
    ) -> Result<usize, WriteError> {
        let total = messages.len();
        let fail = |sent: usize, failed: Option<CanMsg>, source: DriverError| WriteError {
            sent,
            total,
            failed,
            source,
        };

        let mut inner = self.shared.inner.lock();
        match inner.state {
            SessionState::ChannelsReady | SessionState::Running => {}
            SessionState::Closed if inner.fatal => {
                return Err(fail(0, None, DriverError::HardwareUnavailable));
            }
            state => return Err(fail(0, None, DriverError::InvalidState { state })),
        }
        if !inner.channel_active(channel) {
            return Err(fail(0, None, DriverError::ChannelNotReady { channel }));
        }

        let handle = match inner.handle.as_mut() {
            Some(handle) => handle,
            None => return Err(fail(0, None, DriverError::HardwareUnavailable)),
        };

        let mut buf = BytesMut::new();
        for (sent, msg) in messages.iter().enumerate() {
            // field access bypasses the constructors, revalidate
            if msg.len as usize > MAX_DATA_LEN {
                return Err(fail(
                    sent,
                    Some(*msg),
                    DriverError::MalformedFrame(ucan_protocol::ProtocolError::DlcOutOfRange {
                        dlc: msg.len,
                    }),
                ));
            }
            if msg.id > msg.format.id_max() {
                return Err(fail(
                    sent,
                    Some(*msg),
                    DriverError::MalformedFrame(ucan_protocol::ProtocolError::IdOutOfRange {
                        id: msg.id,
                        format: msg.format,
                    }),
                ));
            }

            buf.clear();
            encode_msg(msg, &mut buf);
            if let Err(err) = handle.hardware().send(channel, &buf) {
                warn!(%channel, sent, total, %err, "write stopped mid-batch");
                return Err(fail(sent, Some(*msg), DriverError::from(err)));
            }
        }
        Ok(total)
    }

    /// Reads and clears the controller status word of an active channel.
    pub fn get_status(&self, channel: Channel) -> Result<CanStatus, DriverError> {
        let mut inner = self.shared.inner.lock();
        if inner.fatal {
            return Err(DriverError::HardwareUnavailable);
        }
        if !inner.channel_active(channel) {
            return Err(DriverError::ChannelNotReady { channel });
        }
        let handle = inner.handle.as_mut().ok_or(DriverError::HardwareUnavailable)?;
        handle.hardware().status(channel).map_err(DriverError::from)
    }

    /// Resets the CAN controller of an active channel, flushing its queues.
    pub fn reset_can(&self, channel: Channel) -> Result<(), DriverError> {
        let mut inner = self.shared.inner.lock();
        if inner.fatal {
            return Err(DriverError::HardwareUnavailable);
        }
        if !inner.channel_active(channel) {
            return Err(DriverError::ChannelNotReady { channel });
        }
        let handle = inner.handle.as_mut().ok_or(DriverError::HardwareUnavailable)?;
        handle.hardware().reset(channel).map_err(DriverError::from)
    }

    /// Reprograms the acceptance filter of an active channel.
    pub fn set_acceptance(
        &self,
        channel: Channel,
        amr: u32,
        acr: u32,
    ) -> Result<(), DriverError> {
        let mut inner = self.shared.inner.lock();
        if inner.fatal {
            return Err(DriverError::HardwareUnavailable);
        }
        if !inner.channel_active(channel) {
            return Err(DriverError::ChannelNotReady { channel });
        }
        let handle = inner.handle.as_mut().ok_or(DriverError::HardwareUnavailable)?;
        handle
            .hardware()
            .set_acceptance(channel, amr, acr)
            .map_err(DriverError::from)?;
        if let Some(params) = inner.channels.get_mut(&channel) {
            params.amr = amr;
            params.acr = acr;
        }
        Ok(())
    }

    // Handler registration. Takes effect from the next dispatched event;
    // events delivered before registration are not replayed.

    pub fn on_connection<F>(&self, handler: F)
    where
        F: Fn(ConnectionEvent) + Send + Sync + 'static,
    {
        self.shared.handlers.write().set_connection(Some(Arc::new(handler)));
    }

    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(Channel, &CanMsg) + Send + Sync + 'static,
    {
        self.shared.handlers.write().set_message(Some(Arc::new(handler)));
    }

    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(Channel, CanStatus) + Send + Sync + 'static,
    {
        self.shared.handlers.write().set_error(Some(Arc::new(handler)));
    }

    pub fn on_dispatch_error<F>(&self, handler: F)
    where
        F: Fn(&DriverError) + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .write()
            .set_dispatch_error(Some(Arc::new(handler)));
    }

    pub fn clear_connection_handler(&self) {
        self.shared.handlers.write().set_connection(None);
    }

    pub fn clear_message_handler(&self) {
        self.shared.handlers.write().set_message(None);
    }

    pub fn clear_error_handler(&self) {
        self.shared.handlers.write().set_error(None);
    }

    pub fn clear_dispatch_error_handler(&self) {
        self.shared.handlers.write().set_dispatch_error(None);
    }

    /// Tears the session down: drains the dispatcher, deactivates every
    /// channel, releases the adapter handle. Never fails and may be called
    /// any number of times from any state.
    pub fn shutdown(&mut self) {
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                SessionState::Closed => {
                    drop(inner);
                    if let Some(dispatcher) = self.dispatcher.as_mut() {
                        dispatcher.stop();
                    }
                    return;
                }
                SessionState::Uninitialized => {
                    inner.state = SessionState::Closed;
                    return;
                }
                _ => inner.state = SessionState::ShuttingDown,
            }
        }

        // Join the dispatcher before touching hardware so no event is
        // delivered during teardown. The lock is not held here; the drain
        // needs it for its final poll.
        if let Some(dispatcher) = self.dispatcher.as_mut() {
            dispatcher.stop();
        }

        let mut inner = self.shared.inner.lock();
        let channels: Vec<Channel> = inner.channels.keys().copied().collect();
        if let Some(handle) = inner.handle.as_mut() {
            for channel in channels {
                if let Err(err) = handle.hardware().deconfigure(channel) {
                    warn!(%channel, %err, "channel deinit failed during shutdown");
                }
            }
        }
        inner.channels.clear();
        if let Some(mut handle) = inner.handle.take() {
            handle.release();
        }
        inner.state = SessionState::Closed;
        info!("session closed");
    }
}

impl Drop for UcanSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SessionBuilder;
    use crate::mock::MockOpener;

    fn session_with(device_number: u8) -> (UcanSession, crate::mock::MockController) {
        let opener = MockOpener::with_device_number(device_number);
        let controller = opener.controller();
        let session = SessionBuilder::new()
            .opener(Box::new(opener))
            .build()
            .unwrap();
        (session, controller)
    }

    #[test]
    fn init_hardware_is_idempotent() {
        let (mut session, controller) = session_with(40);
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.init_hardware().unwrap();
        assert_eq!(session.state(), SessionState::HardwareReady);

        session.init_hardware().unwrap();
        assert_eq!(controller.open_calls(), 1);
    }

    #[test]
    fn init_can_requires_hardware() {
        let (mut session, _controller) = session_with(41);
        let err = session
            .init_can(Channel::Ch0, ChannelParams::default())
            .unwrap_err();
        assert_eq!(
            err,
            DriverError::InvalidState {
                state: SessionState::Uninitialized
            }
        );
    }

    #[test]
    fn active_channel_rejects_reconfiguration() {
        let (mut session, _controller) = session_with(42);
        session.init_hardware().unwrap();
        session.init_can(Channel::Ch0, ChannelParams::default()).unwrap();

        let err = session
            .init_can(Channel::Ch0, ChannelParams::default())
            .unwrap_err();
        assert_eq!(err, DriverError::ChannelBusy { channel: Channel::Ch0 });

        // explicit deactivation unlocks reconfiguration
        session.deinit_can(Channel::Ch0).unwrap();
        assert_eq!(session.state(), SessionState::HardwareReady);
        session.init_can(Channel::Ch0, ChannelParams::default()).unwrap();
    }

    #[test]
    fn write_requires_active_channel() {
        let (mut session, _controller) = session_with(43);
        session.init_hardware().unwrap();
        session.init_can(Channel::Ch0, ChannelParams::default()).unwrap();

        let msg = CanMsg::new_standard(0x100, &[1]).unwrap();
        let err = session.write_can_msg(Channel::Ch1, &[msg]).unwrap_err();
        assert_eq!(err.sent, 0);
        assert_eq!(
            err.source,
            DriverError::ChannelNotReady { channel: Channel::Ch1 }
        );
    }

    #[test]
    fn write_revalidates_field_mutated_messages() {
        let (mut session, _controller) = session_with(44);
        session.init_hardware().unwrap();
        session.init_can(Channel::Ch0, ChannelParams::default()).unwrap();

        let mut msg = CanMsg::new_standard(0x100, &[1]).unwrap();
        msg.id = 0x800;
        let err = session.write_can_msg(Channel::Ch0, &[msg]).unwrap_err();
        assert!(matches!(err.source, DriverError::MalformedFrame(_)));
    }

    #[test]
    fn shutdown_is_idempotent_and_total() {
        let (mut session, controller) = session_with(45);
        session.init_hardware().unwrap();
        session.init_can(Channel::Ch0, ChannelParams::default()).unwrap();
        session.start().unwrap();

        session.shutdown();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(controller.is_closed());
        assert_eq!(session.dispatcher_state(), DispatcherState::Stopped);

        session.shutdown();
        assert_eq!(session.state(), SessionState::Closed);

        // everything after shutdown is rejected
        let err = session.init_hardware().unwrap_err();
        assert_eq!(
            err,
            DriverError::InvalidState {
                state: SessionState::Closed
            }
        );
    }

    #[test]
    fn start_requires_configured_channel() {
        let (mut session, _controller) = session_with(46);
        session.init_hardware().unwrap();
        let err = session.start().unwrap_err();
        assert_eq!(
            err,
            DriverError::InvalidState {
                state: SessionState::HardwareReady
            }
        );
    }

    #[test]
    fn set_acceptance_updates_stored_params() {
        let (mut session, controller) = session_with(47);
        session.init_hardware().unwrap();
        session.init_can(Channel::Ch0, ChannelParams::default()).unwrap();

        session.set_acceptance(Channel::Ch0, 0x000F_FFFF, 0x123 << 21).unwrap();
        let params = controller.configured(Channel::Ch0).unwrap();
        assert_eq!(params.amr, 0x000F_FFFF);
        assert_eq!(params.acr, 0x123 << 21);
    }
}
