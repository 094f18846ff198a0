// SPDX-License-Identifier: MPL-2.0

//! The request/response/notification contract, and the `Transport`
//! trait standing in for the kernel's `send`/`receive`/`notify`
//! primitives.

use std::sync::mpsc::{Receiver, RecvError, Sender};

use crate::error::Errno;
use crate::line::{Endpoint, IoctlRequest, ProcNr};
use crate::select::SelectOps;
use crate::termios::{Termios, WinSize};
use crate::usermem::UserMemory;

/// One in-flight IOCTL's payload, carried inline rather than as an opaque
/// byte blob plus a size table, since every request this driver
/// actually accepts has a small fixed shape.
#[derive(Debug, Clone)]
pub enum IoctlArg {
    None,
    Termios(Termios),
    Int(i32),
    WinSize(WinSize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    Read,
    Write,
    Ioctl,
}

/// A device request for a specific minor. Carries a `UserMemory` handle
/// directly rather than a bare `addr` integer, since the
/// virtual-to-physical copy primitive this stands in for is itself out
/// of this crate's scope.
pub enum DeviceRequest {
    Open { caller: Endpoint, proc_nr: ProcNr, read: bool, write: bool },
    Close { caller: Endpoint, proc_nr: ProcNr },
    Read { caller: Endpoint, proc_nr: ProcNr, mem: Box<dyn UserMemory>, count: usize, nonblocking: bool },
    Write { caller: Endpoint, proc_nr: ProcNr, mem: Box<dyn UserMemory>, count: usize, nonblocking: bool },
    Ioctl { caller: Endpoint, proc_nr: ProcNr, request: IoctlRequest, arg: IoctlArg },
    Select { caller: Endpoint, proc_nr: ProcNr, ops: SelectOps, watch: bool },
    Cancel { caller: Endpoint, proc_nr: ProcNr, mode: CancelMode },
}

/// Asynchronous notifications the dispatcher reacts to between requests.
#[derive(Debug, Clone, Copy)]
pub enum Notification {
    TimerTick,
    HardwareInterrupt { minor: u32 },
    Shutdown,
}

/// One inbound unit of work for `Driver::step`.
pub enum DriverEvent {
    Notify(Notification),
    /// "status probe": emit one pending select-ready or revive event.
    StatusProbe { caller: Endpoint, proc_nr: ProcNr },
    Device { minor: u32, request: DeviceRequest },
}

/// What a request resolved to from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    TaskReply,
    Revive,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub kind: ReplyKind,
    pub proc_nr: ProcNr,
    /// Byte count on success, negative `Errno` on failure.
    pub status: Result<usize, Errno>,
}

/// Stands in for the kernel's `send`/`receive`/`notify` primitives.
pub trait Transport: Send {
    fn recv_event(&mut self) -> Result<DriverEvent, RecvError>;
    fn send_response(&mut self, response: Response);
}

/// In-memory `Transport` built on `std::sync::mpsc`, used by tests and
/// the demo binary in place of the kernel IPC primitives.
pub struct ChannelTransport {
    events: Receiver<DriverEvent>,
    responses: Sender<Response>,
}

impl ChannelTransport {
    pub fn new(events: Receiver<DriverEvent>, responses: Sender<Response>) -> Self {
        ChannelTransport { events, responses }
    }
}

impl Transport for ChannelTransport {
    fn recv_event(&mut self) -> Result<DriverEvent, RecvError> {
        self.events.recv()
    }

    fn send_response(&mut self, response: Response) {
        // The receiving end may have been dropped by a test that only
        // cares about driver-side state; that's not this crate's problem.
        let _ = self.responses.send(response);
    }
}
