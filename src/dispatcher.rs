// SPDX-License-Identifier: MPL-2.0

//! The single-threaded cooperative event loop tying every other module
//! together: request decode, per-line state transitions, the event
//! pump, and select/revive readiness.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace, warn};

use crate::backend::TtyOps;
use crate::error::Errno;
use crate::in_process::in_process;
use crate::in_transfer::in_transfer;
use crate::ioctl::{self, IoctlOutcome};
use crate::line::{IoctlRequest, IoctlSlot, Line, ReadSlot, ReplyMode, WriteSlot};
use crate::message::{
    CancelMode, DeviceRequest, DriverEvent, IoctlArg, Notification, ReplyKind, Response,
};
use crate::minors::{self, DriverConfig, LineClass};

use crate::select::SelectOps;
use crate::signal::SignalSender;
use crate::timers::{Clock, TimerSet};

pub struct Driver {
    config: DriverConfig,
    lines: Vec<Line>,
    timers: TimerSet,
    clock: Box<dyn Clock>,
}

impl Driver {
    /// Builds the line table from `config`'s minor ranges, in the same
    /// class order `line_base` assumes. `backend_for` supplies each
    /// line's device back-end by class and dense index; `signal_sender`
    /// is shared by every line (one process-signal capability for the
    /// whole driver).
    pub fn new(
        config: DriverConfig,
        clock: Box<dyn Clock>,
        signal_sender: Arc<dyn SignalSender>,
        mut backend_for: impl FnMut(LineClass, usize) -> Box<dyn TtyOps>,
    ) -> Self {
        let mut lines = Vec::new();

        for (class, base, count) in [
            (LineClass::Console, config.cons_minor, config.nr_cons),
            (LineClass::Serial, config.rs232_minor, config.nr_rs_lines),
            (LineClass::PtyTerminal, config.ttypx_minor, config.nr_ptys),
            (LineClass::PtyMaster, config.ptypx_minor, config.nr_ptys),
        ] {
            for i in 0..count {
                let idx = lines.len();
                lines.push(Line::new(
                    base + i,
                    idx,
                    config.input_ring_capacity,
                    config.output_ring_capacity,
                    backend_for(class, i as usize),
                    signal_sender.clone(),
                ));
            }
        }

        Driver { config, lines, timers: TimerSet::new(), clock }
    }

    /// The dense line-table index of the first line in `class`, matching
    /// the construction order in `new`.
    fn line_base(&self, class: LineClass) -> usize {
        let c = &self.config;
        match class {
            LineClass::Console | LineClass::Log => 0,
            LineClass::Serial => c.nr_cons as usize,
            LineClass::PtyTerminal => (c.nr_cons + c.nr_rs_lines) as usize,
            LineClass::PtyMaster => (c.nr_cons + c.nr_rs_lines + c.nr_ptys) as usize,
        }
    }

    fn line_for_minor(&self, minor: u32) -> Option<usize> {
        let (class, dense_idx) = minors::resolve(&self.config, minor)?;
        Some(self.line_base(class) + dense_idx)
    }

    /// Processes one `DriverEvent`, returning the response to send back
    /// (if any) plus zero or more out-of-band revive responses produced
    /// by the event pump this step triggered.
    pub fn step(&mut self, event: DriverEvent) -> Vec<Response> {
        self.scan_and_pump();

        match event {
            DriverEvent::Notify(n) => {
                self.handle_notification(n);
                Vec::new()
            }
            DriverEvent::StatusProbe { caller, proc_nr } => {
                vec![self.status_probe(caller, proc_nr)]
            }
            DriverEvent::Device { minor, request } => {
                let Some(line_idx) = self.line_for_minor(minor) else {
                    warn!("request for unconfigured minor {minor}");
                    return vec![Response { kind: ReplyKind::TaskReply, proc_nr: request_proc_nr(&request), status: Err(Errno::ENXIO) }];
                };
                let response = self.dispatch_device_request(line_idx, minor, request);
                self.scan_and_pump();
                match response {
                    Some(r) => vec![r],
                    None => Vec::new(),
                }
            }
        }
    }

    fn handle_notification(&mut self, notification: Notification) {
        match notification {
            Notification::TimerTick => {
                let due = self.timers.expire_due(self.clock.now());
                for line_idx in due {
                    trace!("timer fired for line {line_idx}");
                    if let Some(line) = self.lines.get_mut(line_idx) {
                        if let Some(slot) = line.read_slot.as_mut() {
                            slot.min = 0;
                            slot.timer = None;
                        }
                        line.read_timer_armed = false;
                        line.raise_events();
                    }
                }
            }
            Notification::HardwareInterrupt { minor } => {
                if let Some(line_idx) = self.line_for_minor(minor) {
                    self.lines[line_idx].raise_events();
                }
                let due = self.timers.expire_due(self.clock.now());
                for line_idx in due {
                    if let Some(line) = self.lines.get_mut(line_idx) {
                        if let Some(slot) = line.read_slot.as_mut() {
                            slot.min = 0;
                        }
                        line.raise_events();
                    }
                }
            }
            Notification::Shutdown => {
                debug!("shutdown notification received");
                for line in &mut self.lines {
                    line.backend.close();
                }
            }
        }
    }

    fn dispatch_device_request(&mut self, line_idx: usize, minor: u32, request: DeviceRequest) -> Option<Response> {
        match request {
            DeviceRequest::Open { caller: _, proc_nr, read, write: _ } => {
                let class = minors::resolve(&self.config, minor).map(|(c, _)| c);
                if class == Some(LineClass::Log) && read {
                    return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EACCES) });
                }
                self.lines[line_idx].openct += 1;
                Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(0) })
            }

            DeviceRequest::Close { caller: _, proc_nr } => {
                let line = &mut self.lines[line_idx];
                line.openct = line.openct.saturating_sub(1);
                if line.openct == 0 {
                    line.reset_on_close();
                }
                Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(0) })
            }

            DeviceRequest::Read { caller, proc_nr, mem, count, nonblocking } => {
                self.do_read(line_idx, caller, proc_nr, mem, count, nonblocking)
            }

            DeviceRequest::Write { caller, proc_nr, mem, count, nonblocking } => {
                self.do_write(line_idx, caller, proc_nr, mem, count, nonblocking)
            }

            DeviceRequest::Ioctl { caller, proc_nr, request, arg } => {
                self.do_ioctl(line_idx, caller, proc_nr, request, arg)
            }

            DeviceRequest::Select { caller: _, proc_nr, ops, watch } => {
                Some(self.do_select(line_idx, proc_nr, ops, watch))
            }

            DeviceRequest::Cancel { caller: _, proc_nr, mode } => {
                self.do_cancel(line_idx, proc_nr, mode);
                let _ = minor;
                Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EINTR) })
            }
        }
    }

    /// Errors surface as an immediate `TaskReply`; a satisfied or
    /// suspended read returns `None`/`Some` depending on `reply_mode`.
    fn do_read(
        &mut self,
        line_idx: usize,
        caller: u32,
        proc_nr: i32,
        mem: Box<dyn crate::usermem::UserMemory>,
        count: usize,
        nonblocking: bool,
    ) -> Option<Response> {
        if self.lines[line_idx].read_slot.is_some() {
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EIO) });
        }
        if count == 0 {
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EINVAL) });
        }

        let min = self.effective_read_min(line_idx);

        {
            let line = &mut self.lines[line_idx];
            line.read_slot = Some(ReadSlot {
                caller,
                proc_nr,
                mem,
                left: count,
                cum: 0,
                reply_mode: ReplyMode::Immediate,
                min,
                timer: None,
                fault: None,
            });
        }
        self.arm_read_timer_if_needed(line_idx);

        in_transfer(&mut self.lines[line_idx]);
        self.pump_line(line_idx);

        self.finish_or_suspend_read(line_idx, nonblocking)
    }

    /// Computes the VMIN/VTIME-derived `min` for a newly started read.
    /// Arming of the inter-byte timer happens separately in
    /// `arm_read_timer_if_needed` since it depends on whether the ring is
    /// already non-empty.
    fn effective_read_min(&self, line_idx: usize) -> u8 {
        let termios = &self.lines[line_idx].termios;
        if termios.is_canonical() {
            return 1;
        }
        let vmin = termios.raw_vmin();
        let vtime = termios.raw_vtime();
        if vmin == 0 && vtime > 0 {
            1
        } else {
            vmin
        }
    }

    fn arm_read_timer_if_needed(&mut self, line_idx: usize) {
        let (canonical, vmin, vtime) = {
            let t = &self.lines[line_idx].termios;
            (t.is_canonical(), t.raw_vmin(), t.raw_vtime())
        };
        if canonical || vtime == 0 {
            return;
        }
        if vmin == 0 {
            // Single-shot: arm immediately regardless of ring contents.
            let handle = self.timers.arm(self.clock.as_ref(), line_idx, Duration::from_millis(vtime as u64 * 100));
            if let Some(slot) = self.lines[line_idx].read_slot.as_mut() {
                slot.timer = Some(handle);
            }
            self.lines[line_idx].read_timer_armed = true;
        }
        // vmin > 0, vtime > 0: inter-byte timer arms on first received
        // byte inside `in_process`, not here, unless the ring already
        // has data to start the clock against.
        else if !self.lines[line_idx].input.is_empty() && !self.lines[line_idx].read_timer_armed {
            let handle = self.timers.arm(self.clock.as_ref(), line_idx, Duration::from_millis(vtime as u64 * 100));
            if let Some(slot) = self.lines[line_idx].read_slot.as_mut() {
                slot.timer = Some(handle);
            }
            self.lines[line_idx].read_timer_armed = true;
        }
    }

    fn finish_or_suspend_read(&mut self, line_idx: usize, nonblocking: bool) -> Option<Response> {
        let line = &mut self.lines[line_idx];
        let Some(slot) = line.read_slot.as_ref() else {
            return None;
        };
        if let Some(err) = slot.fault {
            let proc_nr = slot.proc_nr;
            line.read_slot = None;
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(err.errno()) });
        }
        if slot.left == 0 {
            let proc_nr = slot.proc_nr;
            let cum = slot.cum;
            let reply_mode = slot.reply_mode;
            line.read_slot = None;
            let kind = if reply_mode == ReplyMode::Revive { ReplyKind::Revive } else { ReplyKind::TaskReply };
            return Some(Response { kind, proc_nr, status: Ok(cum) });
        }
        if nonblocking {
            let proc_nr = slot.proc_nr;
            let cum = slot.cum;
            line.read_slot = None;
            if cum > 0 {
                return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(cum) });
            }
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EAGAIN) });
        }
        line.read_slot.as_mut().unwrap().reply_mode = ReplyMode::Revive;
        None
    }

    /// Symmetric to `do_read`: queues bytes, runs the pump, then
    /// either replies immediately, returns bytes-written-so-far /
    /// EAGAIN for a nonblocking caller, or suspends for revive.
    fn do_write(
        &mut self,
        line_idx: usize,
        caller: u32,
        proc_nr: i32,
        mut mem: Box<dyn crate::usermem::UserMemory>,
        count: usize,
        nonblocking: bool,
    ) -> Option<Response> {
        if self.lines[line_idx].write_slot.is_some() {
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EIO) });
        }
        if count == 0 {
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EINVAL) });
        }

        const BOUNCE: usize = 64;
        let mut cum = 0;
        let mut fault = None;
        while cum < count {
            let n = BOUNCE.min(count - cum);
            let mut buf = vec![0u8; n];
            if let Err(err) = mem.copy_from_user(cum, &mut buf) {
                fault = Some(err);
                break;
            }
            self.lines[line_idx].output.queue(&buf);
            cum += n;
        }

        self.lines[line_idx].write_slot = Some(WriteSlot {
            caller,
            proc_nr,
            mem,
            left: count - cum,
            cum,
            reply_mode: ReplyMode::Immediate,
        });

        self.pump_line(line_idx);

        let line = &mut self.lines[line_idx];
        let slot_cum = line.write_slot.as_ref().map(|s| s.cum).unwrap_or(cum);
        let slot_left = line.write_slot.as_ref().map(|s| s.left).unwrap_or(0);

        if let Some(err) = fault {
            line.write_slot = None;
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(err.errno()) });
        }
        if slot_left == 0 {
            line.write_slot = None;
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(slot_cum) });
        }
        if nonblocking {
            line.write_slot = None;
            if slot_cum > 0 {
                return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(slot_cum) });
            }
            return Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EAGAIN) });
        }
        line.write_slot.as_mut().unwrap().reply_mode = ReplyMode::Revive;
        None
    }

    fn do_ioctl(&mut self, line_idx: usize, caller: u32, proc_nr: i32, request: IoctlRequest, arg: IoctlArg) -> Option<Response> {
        let new_termios = match arg {
            IoctlArg::Termios(t) => Some(t),
            _ => None,
        };

        match ioctl::dispatch(&mut self.lines[line_idx], &mut self.timers, self.clock.as_ref(), line_idx, request, new_termios) {
            IoctlOutcome::Done(Ok(())) => {
                Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(0) })
            }
            IoctlOutcome::Done(Err(errno)) => {
                Some(Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(errno) })
            }
            IoctlOutcome::Suspend => {
                self.lines[line_idx].ioctl_slot = Some(IoctlSlot { caller, proc_nr, request, termios: new_termios });
                None
            }
        }
    }

    /// Readiness of `ops` for `line_idx` without blocking.
    fn select_try(&self, line_idx: usize, ops: SelectOps) -> SelectOps {
        let line = &self.lines[line_idx];
        if line.termios.is_hangup() {
            return ops;
        }
        let mut ready = SelectOps::empty();
        if ops.contains(SelectOps::READ) {
            let read_ready = line.read_slot.is_some()
                || (!line.termios.is_canonical() && !line.input.is_empty())
                || (line.termios.is_canonical() && line.input.eotct() > 0);
            if read_ready {
                ready |= SelectOps::READ;
            }
        }
        if ops.contains(SelectOps::WRITE) {
            if line.write_slot.is_some() || line.backend.write_ready() {
                ready |= SelectOps::WRITE;
            }
        }
        ready
    }

    fn do_select(&mut self, line_idx: usize, proc_nr: i32, ops: SelectOps, watch: bool) -> Response {
        let ready = self.select_try(line_idx, ops);
        if !ready.is_empty() || !watch {
            return Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(ready.bits() as usize) };
        }
        let line = &mut self.lines[line_idx];
        line.select_ops |= ops;
        line.select_proc = Some(proc_nr);
        Response { kind: ReplyKind::TaskReply, proc_nr, status: Ok(0) }
    }

    /// Re-checks a watched line's readiness after any ring or write-ready
    /// change; raises `events` so the next status probe notifies the
    /// recorded watcher.
    fn select_retry(&mut self, line_idx: usize) {
        let Some(_proc_nr) = self.lines[line_idx].select_proc else { return };
        let watched = self.lines[line_idx].select_ops;
        if watched.is_empty() {
            return;
        }
        let ready = self.select_try(line_idx, watched);
        if !ready.is_empty() {
            self.lines[line_idx].raise_events();
        }
    }

    /// Matches and cancels outstanding slots for `proc_nr`, guarding
    /// against double-cancel via process-number comparison.
    fn do_cancel(&mut self, line_idx: usize, proc_nr: i32, mode: CancelMode) {
        let line = &mut self.lines[line_idx];
        match mode {
            CancelMode::Read => {
                if let Some(slot) = &line.read_slot {
                    if slot.proc_nr == proc_nr {
                        if let Some(handle) = line.read_slot.as_mut().and_then(|s| s.timer.take()) {
                            self.timers.disarm(handle);
                        }
                        line.read_slot = None;
                        line.read_timer_armed = false;
                        line.raise_events();
                    }
                }
            }
            CancelMode::Write => {
                if let Some(slot) = &line.write_slot {
                    if slot.proc_nr == proc_nr {
                        line.backend.ocancel();
                        line.write_slot = None;
                        line.raise_events();
                    }
                }
            }
            CancelMode::Ioctl => {
                if let Some(slot) = &line.ioctl_slot {
                    if slot.proc_nr == proc_nr {
                        line.ioctl_slot = None;
                        line.raise_events();
                    }
                }
            }
        }
    }

    /// The level-triggered status probe: emits at most one pending
    /// select-readiness or revive event, tie-broken select > input revive
    /// > output revive, scanned in line order.
    fn status_probe(&mut self, _caller: u32, proc_nr: i32) -> Response {
        for line_idx in 0..self.lines.len() {
            if let Some(select_proc) = self.lines[line_idx].select_proc {
                let watched = self.lines[line_idx].select_ops;
                let ready = self.select_try(line_idx, watched);
                if !ready.is_empty() {
                    self.lines[line_idx].select_ops = SelectOps::empty();
                    self.lines[line_idx].select_proc = None;
                    return Response { kind: ReplyKind::TaskReply, proc_nr: select_proc, status: Ok(ready.bits() as usize) };
                }
            }
        }
        for line_idx in 0..self.lines.len() {
            if let Some(response) = self.finish_or_suspend_read(line_idx, false) {
                if matches!(self.lines[line_idx].read_slot, None) {
                    return response;
                }
            }
        }
        for line_idx in 0..self.lines.len() {
            self.pump_line(line_idx);
            let line = &self.lines[line_idx];
            if let Some(slot) = &line.write_slot {
                if slot.left == 0 && slot.reply_mode == ReplyMode::Revive {
                    let response = Response { kind: ReplyKind::Revive, proc_nr: slot.proc_nr, status: Ok(slot.cum) };
                    self.lines[line_idx].write_slot = None;
                    return response;
                }
            }
        }
        Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EAGAIN) }
    }

    /// Runs the event pump over every line with a raised `events` flag.
    fn scan_and_pump(&mut self) {
        for line_idx in 0..self.lines.len() {
            if self.lines[line_idx].events {
                self.lines[line_idx].events = false;
                self.pump_line(line_idx);
            }
        }
    }

    /// One event-pump iteration for a single line: pulls available
    /// back-end input through `in_process`, advances output processing
    /// and back-end drain, tries to satisfy a pending read, and
    /// re-evaluates select readiness.
    fn pump_line(&mut self, line_idx: usize) {
        let bytes = self.lines[line_idx].backend.read_bytes();
        if !bytes.is_empty() {
            for &byte in &bytes {
                if in_process(&mut self.lines[line_idx], &mut self.timers, self.clock.as_ref(), line_idx, byte) == 0 {
                    break;
                }
            }
        }

        in_transfer(&mut self.lines[line_idx]);

        let oflag = self.lines[line_idx].termios.oflag;
        loop {
            let (consumed, produced) = self.lines[line_idx].output.process(oflag);
            if consumed == 0 && produced == 0 {
                break;
            }
        }
        // A VSTOP byte (or TCOOFF) halts delivery to the back-end
        // without discarding what's already queued; TCOON/VSTART
        // flushes it in one go on a later pump.
        if !self.lines[line_idx].inhibited {
            let ready = self.lines[line_idx].output.drain_ready(usize::MAX);
            if !ready.is_empty() {
                let sent = self.lines[line_idx].backend.write_bytes(&ready);
                debug_assert!(sent <= ready.len());
            }
        }

        if self.lines[line_idx].output.pending_len() == 0 && self.lines[line_idx].output.ready_len() == 0 {
            if let Some(slot) = self.lines[line_idx].ioctl_slot.take() {
                self.service_parked_ioctl(line_idx, slot);
            }
        }

        self.select_retry(line_idx);
    }

    fn service_parked_ioctl(&mut self, line_idx: usize, slot: IoctlSlot) {
        if slot.request == IoctlRequest::SetTermiosFlush {
            self.lines[line_idx].backend.icancel();
            self.lines[line_idx].input.clear();
        }
        if let Some(t) = slot.termios {
            self.lines[line_idx].termios = t;
            ioctl::setattr(&mut self.lines[line_idx], &mut self.timers, self.clock.as_ref(), line_idx);
        }
    }

    /// The fatal invariant violation error path: logs at `error!` and
    /// returns a sentinel response instead of aborting the process,
    /// since a library crate must not call
    /// `process::exit`.
    pub fn fatal(&self, proc_nr: i32, msg: &'static str) -> Response {
        error!("fatal: {msg}");
        Response { kind: ReplyKind::TaskReply, proc_nr, status: Err(Errno::EIO) }
    }
}

fn request_proc_nr(request: &DeviceRequest) -> i32 {
    match request {
        DeviceRequest::Open { proc_nr, .. }
        | DeviceRequest::Close { proc_nr, .. }
        | DeviceRequest::Read { proc_nr, .. }
        | DeviceRequest::Write { proc_nr, .. }
        | DeviceRequest::Ioctl { proc_nr, .. }
        | DeviceRequest::Select { proc_nr, .. }
        | DeviceRequest::Cancel { proc_nr, .. } => *proc_nr,
    }
}
