//! Drives the full session stack against the in-memory backend.
//!
//! Run with: cargo run -p ucan-driver --example mock_session

use std::time::Duration;

use ucan_driver::mock::MockOpener;
use ucan_driver::{
    Bitrate, CanMsg, CanStatus, Channel, ChannelParams, HardwareEvent, SessionBuilder,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let opener = MockOpener::new();
    let controller = opener.controller();

    let mut session = SessionBuilder::new()
        .opener(Box::new(opener))
        .poll_timeout(Duration::from_millis(5))
        .build()?;

    session.init_hardware()?;
    session.init_can(Channel::Ch0, ChannelParams::new(Bitrate::Rate500k))?;

    session.on_message(|channel, msg| {
        println!("rx {channel}: id=0x{:03X} data={:02X?}", msg.id, msg.data());
    });
    session.on_error(|channel, status| {
        println!("status {channel}: {status}");
    });
    session.start()?;

    // pretend the bus answers
    controller.push_frame(Channel::Ch0, &CanMsg::new_standard(0x123, &[0xDE, 0xAD])?);
    controller.push_event(HardwareEvent::Status {
        channel: Channel::Ch0,
        status: CanStatus(CanStatus::BUSLIGHT),
    });

    let request = CanMsg::new_standard(0x321, &[0x01, 0x02, 0x03])?;
    session.write_can_msg(Channel::Ch0, &[request])?;

    std::thread::sleep(Duration::from_millis(50));
    println!("tx capture: {} frame(s)", controller.sent_frames().len());

    session.shutdown();
    Ok(())
}
