// SPDX-License-Identifier: MPL-2.0

//! IOCTL dispatch and the `setattr` termios-commit path.

use crate::line::{IoctlRequest, Line};
use crate::signal::Signal;
use crate::termios::{CC, Speed, Termios};
use crate::timers::{Clock, TimerSet};

/// What an ioctl dispatch resolved to. `Done` carries the reply status
/// immediately; `Suspend` means the request was parked in the line's
/// ioctl slot pending output drain (TCSETSW/TCSETSF/TCDRAIN).
pub enum IoctlOutcome {
    Done(Result<(), crate::error::Errno>),
    Suspend,
}

/// Dispatches one ioctl request against `line`. `new_termios` carries the
/// already-copied-in parameter for the `TCSETS*` family; other requests
/// ignore it.
pub fn dispatch(
    line: &mut Line,
    timers: &mut TimerSet,
    clock: &dyn Clock,
    line_idx: usize,
    request: IoctlRequest,
    new_termios: Option<Termios>,
) -> IoctlOutcome {
    use crate::error::Errno;
    use IoctlRequest::*;

    match request {
        GetTermios => IoctlOutcome::Done(Ok(())),

        SetTermios => {
            if let Some(t) = new_termios {
                line.termios = t;
                setattr(line, timers, clock, line_idx);
            }
            IoctlOutcome::Done(Ok(()))
        }

        SetTermiosDrain | SetTermiosFlush | Drain => {
            if line.output.pending_len() > 0 || line.output.ready_len() > 0 {
                IoctlOutcome::Suspend
            } else {
                if request == SetTermiosFlush {
                    line.backend.icancel();
                    line.input.clear();
                }
                if let Some(t) = new_termios {
                    line.termios = t;
                    setattr(line, timers, clock, line_idx);
                }
                IoctlOutcome::Done(Ok(()))
            }
        }

        GetWinSize => IoctlOutcome::Done(Ok(())),

        SetWinSize => {
            if let Some(pgrp) = line.pgrp {
                line.signal_sender.send(pgrp, Signal::Sigwinch);
            }
            IoctlOutcome::Done(Ok(()))
        }

        GetPgrp | SetPgrp => IoctlOutcome::Done(Err(Errno::ENOTTY)),

        FlushInput => {
            line.backend.icancel();
            line.input.clear();
            IoctlOutcome::Done(Ok(()))
        }
        FlushOutput => {
            line.backend.ocancel();
            line.output.clear();
            IoctlOutcome::Done(Ok(()))
        }
        FlushBoth => {
            line.backend.icancel();
            line.input.clear();
            line.backend.ocancel();
            line.output.clear();
            IoctlOutcome::Done(Ok(()))
        }

        FlowOff => {
            line.inhibited = true;
            line.raise_events();
            IoctlOutcome::Done(Ok(()))
        }
        FlowOn => {
            line.inhibited = false;
            line.raise_events();
            IoctlOutcome::Done(Ok(()))
        }
        FlowCharOff => {
            let vstop = line.termios.cc(CC::VSTOP);
            line.backend.echo(vstop);
            IoctlOutcome::Done(Ok(()))
        }
        FlowCharOn => {
            let vstart = line.termios.cc(CC::VSTART);
            line.backend.echo(vstart);
            IoctlOutcome::Done(Ok(()))
        }

        SendBreak => {
            line.backend.break_signal();
            IoctlOutcome::Done(Ok(()))
        }
    }
}

/// Commits a termios change. Stamps EOT on buffered input if canonical
/// mode was just turned off, disarms the read timer, recomputes
/// the effective `min`, releases flow-control inhibition if IXON is off,
/// raises SIGHUP on a transition to B0, and pushes the new settings down
/// to the back-end.
pub fn setattr(line: &mut Line, timers: &mut TimerSet, clock: &dyn Clock, line_idx: usize) {
    let canonical = line.termios.is_canonical();

    if !canonical {
        line.input.stamp_all_eot();
    }

    if let Some(handle) = line.read_slot.as_mut().and_then(|slot| slot.timer.take()) {
        timers.disarm(handle);
    }
    line.read_timer_armed = false;

    let min = if canonical {
        1
    } else {
        let vmin = line.termios.raw_vmin();
        let vtime = line.termios.raw_vtime();
        if vmin == 0 && vtime > 0 {
            1
        } else {
            vmin
        }
    };
    if let Some(slot) = line.read_slot.as_mut() {
        slot.min = min;
    }

    if !line.termios.iflag.contains(crate::termios::IFlags::IXON) {
        line.inhibited = false;
        line.raise_events();
    }

    if line.termios.ospeed == Speed::B0 {
        if let Some(pgrp) = line.pgrp {
            line.signal_sender.send(pgrp, Signal::Sighup);
        }
    }

    let termios = line.termios;
    line.backend.ioctl(&termios);

    if let Some(slot) = line.read_slot.as_ref() {
        if slot.left > 0 && line.input.eotct() >= slot.min as usize {
            crate::in_transfer::in_transfer(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NopBackend;
    use crate::line::Line;
    use crate::ring::InputWord;
    use crate::signal::RecordingSignalSender;
    use crate::termios::LFlags;
    use crate::timers::RealClock;
    use std::sync::Arc;

    fn test_line() -> Line {
        Line::new(0, 0, 64, 64, Box::new(NopBackend), Arc::new(RecordingSignalSender::default()))
    }

    #[test]
    fn turning_off_canonical_stamps_eot_on_buffered_input() {
        let mut line = test_line();
        line.input.push_back(InputWord::new(b'a'));
        line.input.push_back(InputWord::new(b'b'));
        line.termios.lflag.remove(LFlags::ICANON);

        let mut timers = TimerSet::new();
        setattr(&mut line, &mut timers, &RealClock, 0);

        assert_eq!(line.input.eotct(), 2);
    }

    #[test]
    fn raw_vmin_zero_vtime_positive_forces_min_one() {
        let mut line = test_line();
        line.termios.lflag.remove(LFlags::ICANON);
        line.termios.set_cc(CC::VMIN, 0);
        line.termios.set_cc(CC::VTIME, 10);
        line.read_slot = Some(crate::line::ReadSlot {
            caller: 0,
            proc_nr: 0,
            mem: Box::new(crate::usermem::VecUserMemory::new(1)),
            left: 1,
            cum: 0,
            reply_mode: crate::line::ReplyMode::Immediate,
            min: 0,
            timer: None,
            fault: None,
        });

        let mut timers = TimerSet::new();
        setattr(&mut line, &mut timers, &RealClock, 0);

        assert_eq!(line.read_slot.as_ref().unwrap().min, 1);
    }

    #[test]
    fn hangup_transition_sends_sighup_to_pgrp() {
        let sender = Arc::new(RecordingSignalSender::default());
        let mut line = Line::new(0, 0, 64, 64, Box::new(NopBackend), sender.clone());
        line.pgrp = Some(7);
        line.termios.ospeed = Speed::B0;

        let mut timers = TimerSet::new();
        setattr(&mut line, &mut timers, &RealClock, 0);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(*sent, vec![(7, crate::signal::Signal::Sighup)]);
    }

    #[test]
    fn get_pgrp_and_set_pgrp_are_not_a_tty() {
        let mut line = test_line();
        let mut timers = TimerSet::new();
        let outcome = dispatch(&mut line, &mut timers, &RealClock, 0, IoctlRequest::GetPgrp, None);
        match outcome {
            IoctlOutcome::Done(Err(crate::error::Errno::ENOTTY)) => {}
            _ => panic!("expected ENOTTY"),
        }
    }

    #[test]
    fn tcsetsw_with_pending_output_suspends() {
        let mut line = test_line();
        line.output.queue(b"hi");
        let mut timers = TimerSet::new();
        let outcome = dispatch(
            &mut line,
            &mut timers,
            &RealClock,
            0,
            IoctlRequest::SetTermiosDrain,
            Some(Termios::default()),
        );
        assert!(matches!(outcome, IoctlOutcome::Suspend));
    }

    #[test]
    fn flow_off_on_toggles_inhibited() {
        let mut line = test_line();
        let mut timers = TimerSet::new();
        dispatch(&mut line, &mut timers, &RealClock, 0, IoctlRequest::FlowOff, None);
        assert!(line.inhibited);
        dispatch(&mut line, &mut timers, &RealClock, 0, IoctlRequest::FlowOn, None);
        assert!(!line.inhibited);
    }
}
