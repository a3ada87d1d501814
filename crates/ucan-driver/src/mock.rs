//! In-memory hardware backend.
//!
//! [`MockOpener`] plays the USB side of the driver for tests and examples:
//! events are injected through a [`MockController`], transmitted frames are
//! captured for inspection, and individual calls can be made to fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;

use ucan_protocol::{CHANNEL_COUNT, CanMsg, CanStatus, Channel, encode_msg};

use crate::config::ChannelParams;
use crate::hal::{DeviceSelector, HardwareError, HardwareEvent, HardwareOpener, UcanHardware};

type EventResult = Result<HardwareEvent, HardwareError>;

#[derive(Default)]
struct MockShared {
    configured: Mutex<[Option<ChannelParams>; CHANNEL_COUNT]>,
    sent: Mutex<Vec<(Channel, Vec<u8>)>>,
    status: Mutex<[CanStatus; CHANNEL_COUNT]>,
    reset_count: AtomicUsize,
    open_calls: AtomicUsize,
    closed: AtomicBool,
    fail_next_open: Mutex<Option<HardwareError>>,
    fail_next_configure: Mutex<Option<HardwareError>>,
    /// Fail the send once the captured count reaches this index.
    fail_send_at: Mutex<Option<(usize, HardwareError)>>,
}

/// Factory handed to [`SessionBuilder::opener`](crate::SessionBuilder::opener).
pub struct MockOpener {
    shared: Arc<MockShared>,
    device_number: u8,
    event_tx: Sender<EventResult>,
    event_rx: Receiver<EventResult>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::with_device_number(0)
    }

    pub fn with_device_number(device_number: u8) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            shared: Arc::new(MockShared::default()),
            device_number,
            event_tx,
            event_rx,
        }
    }

    /// Test-side handle for injecting events and inspecting state.
    pub fn controller(&self) -> MockController {
        MockController {
            shared: self.shared.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

impl Default for MockOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareOpener for MockOpener {
    fn open(&self, _selector: DeviceSelector) -> Result<Box<dyn UcanHardware>, HardwareError> {
        self.shared.open_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.shared.fail_next_open.lock().take() {
            return Err(err);
        }
        self.shared.closed.store(false, Ordering::SeqCst);
        Ok(Box::new(MockUcan {
            shared: self.shared.clone(),
            device_number: self.device_number,
            event_rx: self.event_rx.clone(),
        }))
    }
}

/// Test-side view of the mock device.
#[derive(Clone)]
pub struct MockController {
    shared: Arc<MockShared>,
    event_tx: Sender<EventResult>,
}

impl MockController {
    pub fn push_event(&self, event: HardwareEvent) {
        let _ = self.event_tx.send(Ok(event));
    }

    /// Makes the next poll return `err` instead of an event.
    pub fn push_poll_error(&self, err: HardwareError) {
        let _ = self.event_tx.send(Err(err));
    }

    /// Injects a received frame, already wire-encoded.
    pub fn push_frame(&self, channel: Channel, msg: &CanMsg) {
        let mut buf = BytesMut::new();
        encode_msg(msg, &mut buf);
        self.push_event(HardwareEvent::Frame {
            channel,
            bytes: buf.freeze(),
        });
    }

    /// Injects a raw receive record without encoding.
    pub fn push_raw_frame(&self, channel: Channel, bytes: Bytes) {
        self.push_event(HardwareEvent::Frame { channel, bytes });
    }

    pub fn sent_frames(&self) -> Vec<(Channel, Vec<u8>)> {
        self.shared.sent.lock().clone()
    }

    pub fn configured(&self, channel: Channel) -> Option<ChannelParams> {
        self.shared.configured.lock()[channel.index()]
    }

    pub fn set_status(&self, channel: Channel, status: CanStatus) {
        self.shared.status.lock()[channel.index()] = status;
    }

    pub fn reset_count(&self) -> usize {
        self.shared.reset_count.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.shared.open_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn fail_next_open(&self, err: HardwareError) {
        *self.shared.fail_next_open.lock() = Some(err);
    }

    pub fn fail_next_configure(&self, err: HardwareError) {
        *self.shared.fail_next_configure.lock() = Some(err);
    }

    /// Fails the send that would land at index `index` in the capture log.
    pub fn fail_send_at(&self, index: usize, err: HardwareError) {
        *self.shared.fail_send_at.lock() = Some((index, err));
    }
}

struct MockUcan {
    shared: Arc<MockShared>,
    device_number: u8,
    event_rx: Receiver<EventResult>,
}

impl UcanHardware for MockUcan {
    fn configure(&mut self, channel: Channel, params: &ChannelParams) -> Result<(), HardwareError> {
        if let Some(err) = self.shared.fail_next_configure.lock().take() {
            return Err(err);
        }
        self.shared.configured.lock()[channel.index()] = Some(*params);
        Ok(())
    }

    fn deconfigure(&mut self, channel: Channel) -> Result<(), HardwareError> {
        match self.shared.configured.lock()[channel.index()].take() {
            Some(_) => Ok(()),
            None => Err(HardwareError::Rejected { code: 0x05 }),
        }
    }

    fn send(&mut self, channel: Channel, frame: &[u8]) -> Result<(), HardwareError> {
        let mut sent = self.shared.sent.lock();
        let mut planned = self.shared.fail_send_at.lock();
        if let Some((_, err)) = planned.take_if(|(index, _)| *index == sent.len()) {
            return Err(err);
        }
        sent.push((channel, frame.to_vec()));
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<HardwareEvent, HardwareError> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(HardwareError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(HardwareError::Disconnected),
        }
    }

    fn status(&mut self, channel: Channel) -> Result<CanStatus, HardwareError> {
        // read-and-clear, mirroring the firmware call
        let mut table = self.shared.status.lock();
        let status = table[channel.index()];
        table[channel.index()] = CanStatus::default();
        Ok(status)
    }

    fn reset(&mut self, channel: Channel) -> Result<(), HardwareError> {
        if self.shared.configured.lock()[channel.index()].is_none() {
            return Err(HardwareError::Rejected { code: 0x05 });
        }
        self.shared.reset_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_acceptance(
        &mut self,
        channel: Channel,
        amr: u32,
        acr: u32,
    ) -> Result<(), HardwareError> {
        match self.shared.configured.lock()[channel.index()].as_mut() {
            Some(params) => {
                params.amr = amr;
                params.acr = acr;
                Ok(())
            }
            None => Err(HardwareError::Rejected { code: 0x05 }),
        }
    }

    fn device_number(&self) -> u8 {
        self.device_number
    }

    fn close(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}
