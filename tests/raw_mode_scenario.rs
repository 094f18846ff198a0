//! Raw-mode VMIN/VTIME end-to-end scenarios: a
//! single-shot read timeout when no bytes ever arrive, and an inter-byte
//! timer that lets a short read complete once its window expires.
//!
//! A blocking read suspends (the driver answers with no immediate
//! response) until a later notification plus a status probe reports the
//! revive; these tests follow that same two-step shape the transport
//! layer would use in production.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use tty_core::backends::LoopbackChannel;
use tty_core::dispatcher::Driver;
use tty_core::line::IoctlRequest;
use tty_core::message::{DeviceRequest, DriverEvent, IoctlArg, Notification};
use tty_core::minors::DriverConfig;
use tty_core::signal::RecordingSignalSender;
use tty_core::termios::{LFlags, Termios, CC};
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

fn set_raw(driver: &mut Driver, minor: u32, vmin: u8, vtime: u8) {
    let mut termios = Termios::default();
    termios.lflag.remove(LFlags::ICANON);
    termios.set_cc(CC::VMIN, vmin);
    termios.set_cc(CC::VTIME, vtime);
    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Ioctl {
            caller: 0,
            proc_nr: 1,
            request: IoctlRequest::SetTermios,
            arg: IoctlArg::Termios(termios),
        },
    });
    assert_eq!(responses[0].status, Ok(0));
}

#[test]
fn vmin_zero_vtime_positive_completes_with_zero_bytes_on_timeout() {
    let (mut driver, _channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });
    set_raw(&mut driver, minor, 0, 1); // VTIME = 1 decisecond = 100ms

    let mem = Box::new(VecUserMemory::new(16));
    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Read { caller: 0, proc_nr: 1, mem, count: 16, nonblocking: false },
    });
    assert!(responses.is_empty(), "read with no buffered input should suspend, not reply immediately");

    sleep(Duration::from_millis(150));
    driver.step(DriverEvent::Notify(Notification::TimerTick));

    let responses = driver.step(DriverEvent::StatusProbe { caller: 0, proc_nr: 1 });
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, Ok(0));
}

#[test]
fn vmin_three_vtime_five_delivers_partial_bytes_once_inter_byte_timer_fires() {
    let (mut driver, channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });
    set_raw(&mut driver, minor, 3, 5); // VTIME = 5 deciseconds = 500ms

    channel.push_input(b"ab"); // fewer than VMIN=3
    driver.step(DriverEvent::Notify(Notification::HardwareInterrupt { minor }));

    let mem = Box::new(VecUserMemory::new(16));
    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Read { caller: 0, proc_nr: 1, mem, count: 16, nonblocking: false },
    });
    assert!(responses.is_empty());

    sleep(Duration::from_millis(600));
    driver.step(DriverEvent::Notify(Notification::TimerTick));

    let responses = driver.step(DriverEvent::StatusProbe { caller: 0, proc_nr: 1 });
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, Ok(2));
}

#[test]
fn vmin_positive_vtime_zero_blocks_until_threshold_met() {
    let (mut driver, channel, minor) = harness();
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 1, read: true, write: true },
    });
    set_raw(&mut driver, minor, 3, 0);

    channel.push_input(b"ab");
    driver.step(DriverEvent::Notify(Notification::HardwareInterrupt { minor }));

    let mem = Box::new(VecUserMemory::new(16));
    let responses = driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Read { caller: 0, proc_nr: 1, mem, count: 16, nonblocking: false },
    });
    assert!(responses.is_empty());

    channel.push_input(b"c");
    driver.step(DriverEvent::Notify(Notification::HardwareInterrupt { minor }));

    let responses = driver.step(DriverEvent::StatusProbe { caller: 0, proc_nr: 1 });
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, Ok(3));
}
