//! Output post-processing end-to-end scenario: a write
//! containing a bare newline and a tab is expanded per OPOST/ONLCR/XTABS
//! before it reaches the device.

use std::sync::Arc;

use tty_core::backends::LoopbackChannel;
use tty_core::dispatcher::Driver;
use tty_core::message::{DeviceRequest, DriverEvent};
use tty_core::minors::DriverConfig;
use tty_core::signal::RecordingSignalSender;
use tty_core::timers::RealClock;
use tty_core::usermem::VecUserMemory;

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
fn newline_expands_to_crlf_under_default_onlcr() {
    let (mut driver, channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });

    let mem = Box::new(VecUserMemory::from_bytes(b"hi\n"));
    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Write { caller: 0, proc_nr: 1, mem, count: 3, nonblocking: false },
    });
    assert_eq!(responses[0].status, Ok(3));
    assert_eq!(channel.take_output(), b"hi\r\n");
}

#[test]
fn tab_expands_to_next_stop_under_default_xtabs() {
    let (mut driver, channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });

    // A single leading tab expands to 8 spaces (next stop from column 0).
    let mem = Box::new(VecUserMemory::from_bytes(b"\tx"));
    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Write { caller: 0, proc_nr: 1, mem, count: 2, nonblocking: false },
    });
    assert_eq!(responses[0].status, Ok(2));
    let out = channel.take_output();
    assert_eq!(out, b"        x");
}
