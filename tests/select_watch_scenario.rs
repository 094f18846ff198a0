//! Select/revive end-to-end scenario: a watching SELECT
//! that finds nothing ready is parked, then revived through a status
//! probe once a later notification makes the line readable.

use std::sync::Arc;

use tty_core::backends::LoopbackChannel;
use tty_core::dispatcher::Driver;
use tty_core::message::{DeviceRequest, DriverEvent, Notification};
use tty_core::minors::DriverConfig;
use tty_core::select::SelectOps;
use tty_core::signal::RecordingSignalSender;
use tty_core::timers::RealClock;

fn harness() -> (Driver, LoopbackChannel, u32) {
    let config = DriverConfig { nr_cons: 2, nr_rs_lines: 0, nr_ptys: 0, ..DriverConfig::default() };
    let channel = LoopbackChannel::new();
    let backend_channel = channel.clone();
    let minor = config.cons_minor + 1;
    let driver = Driver::new(
        config,
        Box::new(RealClock),
        Arc::new(RecordingSignalSender::default()),
        move |_, _| Box::new(backend_channel.backend()),
    );
    (driver, channel, minor)
}

#[test]
fn select_on_an_empty_line_reports_nothing_ready_without_watch() {
    let (mut driver, _channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });

    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Select { caller: 0, proc_nr: 1, ops: SelectOps::READ, watch: false },
    });
    assert_eq!(responses[0].status, Ok(0));
}

#[test]
fn watched_select_revives_once_input_arrives() {
    let (mut driver, channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });

    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Select { caller: 0, proc_nr: 1, ops: SelectOps::READ, watch: true },
    });
    // Nothing ready yet, but the watch is now parked on the line.
    assert_eq!(responses[0].status, Ok(0));

    channel.push_input(b"x\n");
    driver.step(DriverEvent::Notify(Notification::HardwareInterrupt { minor }));

    let responses = driver.step(DriverEvent::StatusProbe { caller: 0, proc_nr: 1 });
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, Ok(SelectOps::READ.bits() as usize));
}

#[test]
fn write_ready_is_reported_immediately_since_the_loopback_backend_always_accepts() {
    let (mut driver, _channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });

    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Select { caller: 0, proc_nr: 1, ops: SelectOps::WRITE, watch: false },
    });
    assert_eq!(responses[0].status, Ok(SelectOps::WRITE.bits() as usize));
}
