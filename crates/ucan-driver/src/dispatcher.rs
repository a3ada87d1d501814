//! Background event dispatcher.
//!
//! One thread polls the hardware for events, decodes them and hands them to
//! the registered handlers. Per-channel delivery order matches poll order
//! because there is exactly one dispatch thread. Handler panics are caught
//! at the dispatch boundary and routed to the dispatch-error handler, so a
//! broken callback never takes the thread down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use ucan_protocol::decode_msg;

use crate::error::DriverError;
use crate::event::{ConnectionEvent, Event};
use crate::hal::{HardwareError, HardwareEvent};
use crate::session::{SessionShared, SessionState};

/// Lifecycle of the dispatch thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    /// Not started.
    Idle = 0,
    /// Polling and delivering events.
    Listening = 1,
    /// Stop requested; the in-flight delivery completes, no new polls start.
    Draining = 2,
    /// Thread exited.
    Stopped = 3,
}

struct AtomicDispatcherState(AtomicU8);

impl AtomicDispatcherState {
    fn new(state: DispatcherState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> DispatcherState {
        match self.0.load(Ordering::Acquire) {
            0 => DispatcherState::Idle,
            1 => DispatcherState::Listening,
            2 => DispatcherState::Draining,
            _ => DispatcherState::Stopped,
        }
    }

    fn set(&self, state: DispatcherState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

pub(crate) struct EventDispatcher {
    state: Arc<AtomicDispatcherState>,
    thread: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    /// Spawns the dispatch thread and moves it to `Listening`.
    pub(crate) fn start(
        shared: Arc<SessionShared>,
        poll_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let state = Arc::new(AtomicDispatcherState::new(DispatcherState::Listening));
        let loop_state = state.clone();
        let thread = std::thread::Builder::new()
            .name("ucan-dispatch".into())
            .spawn(move || dispatch_loop(shared, loop_state, poll_timeout))
            .map_err(|err| DriverError::Dispatch(format!("failed to spawn dispatcher: {err}")))?;

        Ok(Self {
            state,
            thread: Some(thread),
        })
    }

    pub(crate) fn state(&self) -> DispatcherState {
        self.state.get()
    }

    /// Requests a drain and joins the thread. Idempotent.
    pub(crate) fn stop(&mut self) {
        if self.state.get() == DispatcherState::Listening {
            self.state.set(DispatcherState::Draining);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("dispatcher thread terminated abnormally");
            }
        }
        self.state.set(DispatcherState::Stopped);
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch_loop(
    shared: Arc<SessionShared>,
    state: Arc<AtomicDispatcherState>,
    poll_timeout: Duration,
) {
    trace!("dispatcher listening");
    loop {
        if state.get() != DispatcherState::Listening {
            break;
        }

        // The session lock is held only for the bounded poll so command
        // calls interleave with event polling.
        let polled = {
            let mut inner = shared.inner.lock();
            let Some(handle) = inner.handle.as_mut() else {
                break;
            };
            handle.hardware().poll_event(poll_timeout)
        };

        match polled {
            Err(HardwareError::Timeout) => continue,
            Err(err) if err.is_fatal() => {
                warn!(%err, "fatal hardware failure, closing session");
                force_close(&shared);
                deliver(&shared, Event::ConnectionStateChanged(ConnectionEvent::FatalDisconnect));
                break;
            }
            Err(err) => {
                warn!(%err, "event poll failed");
                continue;
            }
            Ok(HardwareEvent::Connected) => {
                deliver(&shared, Event::ConnectionStateChanged(ConnectionEvent::Connected));
            }
            Ok(HardwareEvent::Disconnected) => {
                deliver(&shared, Event::ConnectionStateChanged(ConnectionEvent::Disconnected));
            }
            Ok(HardwareEvent::FatalDisconnect) => {
                warn!("device vanished, closing session");
                force_close(&shared);
                deliver(&shared, Event::ConnectionStateChanged(ConnectionEvent::FatalDisconnect));
                break;
            }
            Ok(HardwareEvent::Status { channel, status }) => {
                deliver(&shared, Event::ErrorOccurred { channel, status });
            }
            Ok(HardwareEvent::Frame { channel, bytes }) => match decode_msg(&bytes) {
                Ok(msg) => {
                    if shared.inner.lock().channel_active(channel) {
                        deliver(&shared, Event::MessageReceived { channel, msg });
                    } else {
                        debug!(%channel, "frame for inactive channel dropped");
                    }
                }
                Err(err) => {
                    debug!(%channel, %err, "malformed receive record dropped");
                    report_failure(&shared, &DriverError::MalformedFrame(err));
                }
            },
        }
    }
    state.set(DispatcherState::Stopped);
    trace!("dispatcher stopped");
}

/// Delivers one event through the handler table, isolating handler panics.
///
/// The table is cloned out of the lock before invocation so a handler can
/// register or clear handlers without deadlocking the dispatch thread.
fn deliver(shared: &SessionShared, event: Event) {
    let table = shared.handlers.read().clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| table.dispatch(&event)));
    match outcome {
        Ok(true) => {}
        Ok(false) => {
            debug!(category = ?event.category(), "no handler registered, event dropped");
        }
        Err(payload) => {
            let err = DriverError::Dispatch(panic_message(payload));
            error!(%err, category = ?event.category(), "event handler panicked");
            report_failure(shared, &err);
        }
    }
}

fn report_failure(shared: &SessionShared, err: &DriverError) {
    let table = shared.handlers.read().clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| table.report_dispatch_error(err)));
    match outcome {
        Ok(true) => {}
        Ok(false) => debug!(%err, "no dispatch-error handler registered"),
        Err(_) => error!("dispatch-error handler panicked"),
    }
}

/// Terminal teardown after an unrecoverable hardware failure. The handle is
/// released and every later session call observes `Closed`.
fn force_close(shared: &SessionShared) {
    let mut inner = shared.inner.lock();
    inner.fatal = true;
    inner.state = SessionState::Closed;
    inner.channels.clear();
    if let Some(mut handle) = inner.handle.take() {
        handle.release();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
