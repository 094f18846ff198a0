// SPDX-License-Identifier: MPL-2.0

//! Per-line state: termios, buffers, pending-request slots, select
//! bookkeeping, and the back-end this line is attached to.

use std::sync::Arc;

use crate::backend::TtyOps;
use crate::error::Error;
use crate::output_ring::OutputRing;
use crate::ring::InputRing;
use crate::select::SelectOps;
use crate::signal::SignalSender;
use crate::termios::{Termios, WinSize};
use crate::timers::TimerHandle;
use crate::usermem::UserMemory;

pub type ProcNr = i32;
pub type Endpoint = u32;

/// How a completed read/write/ioctl is reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Reply inline from the handler that created the slot.
    Immediate,
    /// The request suspended; the event pump will revive it later.
    Revive,
}

pub struct ReadSlot {
    pub caller: Endpoint,
    pub proc_nr: ProcNr,
    pub mem: Box<dyn UserMemory>,
    pub left: usize,
    pub cum: usize,
    pub reply_mode: ReplyMode,
    pub min: u8,
    pub timer: Option<TimerHandle>,
    pub fault: Option<Error>,
}

pub struct WriteSlot {
    pub caller: Endpoint,
    pub proc_nr: ProcNr,
    pub mem: Box<dyn UserMemory>,
    pub left: usize,
    pub cum: usize,
    pub reply_mode: ReplyMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlRequest {
    GetTermios,
    SetTermios,
    SetTermiosDrain,
    SetTermiosFlush,
    Drain,
    GetWinSize,
    SetWinSize,
    GetPgrp,
    SetPgrp,
    FlushInput,
    FlushOutput,
    FlushBoth,
    FlowOff,
    FlowOn,
    FlowCharOff,
    FlowCharOn,
    SendBreak,
}

pub struct IoctlSlot {
    pub caller: Endpoint,
    pub proc_nr: ProcNr,
    pub request: IoctlRequest,
    pub termios: Option<Termios>,
}

pub struct Line {
    pub minor: u32,
    pub index: usize,
    pub termios: Termios,
    pub winsize: WinSize,
    /// Column modulo TAB_SIZE, shared by echo rendering and `out_process`.
    pub position: u16,
    pub pgrp: Option<u32>,
    pub openct: u32,
    pub inhibited: bool,
    pub escaped: bool,
    pub reprint: bool,
    pub input: InputRing,
    pub output: OutputRing,
    pub read_slot: Option<ReadSlot>,
    pub write_slot: Option<WriteSlot>,
    pub ioctl_slot: Option<IoctlSlot>,
    pub select_ops: SelectOps,
    pub select_proc: Option<ProcNr>,
    pub backend: Box<dyn TtyOps>,
    pub signal_sender: Arc<dyn SignalSender>,
    /// Edge flag set by back-ends and timer expiry; cleared by the event pump.
    pub events: bool,
    /// VMIN read-timer handle while a read is suspended on the inter-byte
    /// or single-shot VTIME timer; mirrored from `read_slot.timer`
    /// here so `in_process` can tell whether the timer is already armed
    /// without owning `read_slot` mutably at the same time.
    pub read_timer_armed: bool,
}

impl Line {
    pub fn new(
        minor: u32,
        index: usize,
        input_capacity: usize,
        output_capacity: usize,
        backend: Box<dyn TtyOps>,
        signal_sender: Arc<dyn SignalSender>,
    ) -> Self {
        Line {
            minor,
            index,
            termios: Termios::default(),
            winsize: WinSize::default(),
            position: 0,
            pgrp: None,
            openct: 0,
            inhibited: false,
            escaped: false,
            reprint: false,
            input: InputRing::new(input_capacity),
            output: OutputRing::new(output_capacity),
            read_slot: None,
            write_slot: None,
            ioctl_slot: None,
            select_ops: SelectOps::empty(),
            select_proc: None,
            backend,
            signal_sender,
            events: false,
            read_timer_armed: false,
        }
    }

    pub fn raise_events(&mut self) {
        self.events = true;
    }

    /// Resets termios and winsize to defaults and asks the back-end to
    /// cancel and close, on the last opener's close.
    pub fn reset_on_close(&mut self) {
        self.termios = Termios::default();
        self.winsize = WinSize::default();
        self.input.clear();
        self.output.clear();
        self.position = 0;
        self.inhibited = false;
        self.escaped = false;
        self.reprint = false;
        self.read_timer_armed = false;
        self.backend.icancel();
        self.backend.ocancel();
        self.backend.close();
    }
}
