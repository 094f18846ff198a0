// SPDX-License-Identifier: MPL-2.0

//! Demo entry point: wires one console line to the process's real stdin/
//! stdout through `LoopbackBackend` and runs the dispatcher until EOF.
//! Exercises the same `Driver` API the integration tests drive; not
//! meant as a production front-end (the kernel message transport is
//! not implemented here).

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::info;

use tty_core::backends::LoopbackChannel;
use tty_core::dispatcher::Driver;
use tty_core::message::{DeviceRequest, DriverEvent, Notification};
use tty_core::minors::DriverConfig;
use tty_core::signal::RecordingSignalSender;
use tty_core::timers::RealClock;
use tty_core::usermem::VecUserMemory;

fn main() {
    env_logger::init();

    let config = DriverConfig::default();
    let channel = LoopbackChannel::new();
    let channel_for_backend = channel.clone();
    let mut driver = Driver::new(
        config,
        Box::new(RealClock),
        Arc::new(RecordingSignalSender::default()),
        move |_, _| Box::new(channel_for_backend.backend()),
    );

    let eof = Arc::new(AtomicBool::new(false));
    let (stdin_tx, stdin_rx) = channel::<()>();
    let reader_channel = channel.clone();
    let reader_eof = eof.clone();
    thread::spawn(move || {
        let mut byte = [0u8; 1];
        let mut stdin = std::io::stdin();
        while let Ok(n) = stdin.read(&mut byte) {
            if n == 0 {
                break;
            }
            reader_channel.push_input(&byte);
            let _ = stdin_tx.send(());
        }
        reader_eof.store(true, Ordering::Relaxed);
    });

    let minor = config.cons_minor;
    driver.step(DriverEvent::Device {
        minor,
        request: DeviceRequest::Open { caller: 0, proc_nr: 0, read: true, write: true },
    });

    info!("ttyd demo running on console minor {minor}; type to echo, Ctrl-D to quit");

    loop {
        if eof.load(Ordering::Relaxed) {
            driver.step(DriverEvent::Device { minor, request: DeviceRequest::Close { caller: 0, proc_nr: 0 } });
            break;
        }
        if stdin_rx.recv_timeout(Duration::from_millis(50)).is_ok() {
            driver.step(DriverEvent::Notify(Notification::HardwareInterrupt { minor }));
        } else {
            driver.step(DriverEvent::Notify(Notification::TimerTick));
        }

        let mem = Box::new(VecUserMemory::new(256));
        let responses = driver.step(DriverEvent::Device {
            minor,
            request: DeviceRequest::Read { caller: 0, proc_nr: 0, mem, count: 256, nonblocking: true },
        });
        let _ = responses;

        let out = channel.take_output();
        if !out.is_empty() {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&out);
            let _ = stdout.flush();
        }
        let echoed = channel.take_echoed();
        if !echoed.is_empty() {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&echoed);
            let _ = stdout.flush();
        }
    }
}
