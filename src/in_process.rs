// SPDX-License-Identifier: MPL-2.0

//! The input pipeline: cooks one inbound byte, applying iflag/lflag
//! processing, echo, signals, and flow control, then enqueues a tagged
//! word onto the line's input ring.

use std::time::Duration;

use crate::echo::{back_over, rawecho, reprint, tty_echo};
use crate::line::Line;
use crate::ring::{InputWord, WordFlags};
use crate::signal::Signal;
use crate::termios::{IFlags, LFlags, CC};
use crate::timers::{Clock, TimerSet};

/// True if `ch` matches the special character at `which`, guarding
/// against the `_POSIX_VDISABLE` sentinel (`0`): a cc slot left at its
/// disabled value must never accidentally match an incoming byte of that
/// same value. `VEOL`/`VEOL2`/`VTIME` default to this sentinel, so
/// without the guard a literal NUL byte would be misinterpreted as an
/// end-of-line marker.
fn cc_is(line: &Line, which: CC, ch: u8) -> bool {
    let special = line.termios.cc(which);
    special != 0 && ch == special
}

/// Processes one inbound byte for `line`, identified by `line_idx` in the
/// owning driver's line table (needed to arm the VMIN/VTIME timer).
/// Returns the number of bytes consumed: normally `1`; `0` only when the
/// input ring is full in raw mode, signaling the back-end to hold the
/// remaining tail of its batch.
pub fn in_process(
    line: &mut Line,
    timers: &mut TimerSet,
    clock: &dyn Clock,
    line_idx: usize,
    mut ch: u8,
) -> usize {
    let iflag = line.termios.iflag;
    let lflag = line.termios.lflag;
    let canonical = line.termios.is_canonical();

    // 1. ISTRIP
    if iflag.contains(IFlags::ISTRIP) {
        ch &= 0x7f;
    }

    // 2. IEXTEN literal-next: a pending VLNEXT tags this byte ESC and is
    // not itself enqueued.
    if line.escaped {
        line.escaped = false;
        enqueue(line, InputWord { ch, flags: WordFlags::ESC, len: 0 });
        return 1;
    }
    if lflag.contains(LFlags::IEXTEN) && cc_is(line, CC::VLNEXT, ch) {
        line.escaped = true;
        line.backend.echo(b'^');
        line.backend.echo(0x08);
        return 1;
    }

    // 3. IEXTEN reprint
    if lflag.contains(LFlags::IEXTEN) && cc_is(line, CC::VREPRINT, ch) {
        reprint(line);
        return 1;
    }

    // 5. CR/LF translation
    if ch == b'\r' {
        if iflag.contains(IFlags::IGNCR) {
            return 1;
        }
        if iflag.contains(IFlags::ICRNL) {
            ch = b'\n';
        }
    } else if ch == b'\n' && iflag.contains(IFlags::INLCR) {
        ch = b'\r';
    }

    // 9. Overflow check up front: canonical drops the byte but still
    // reports it consumed; raw mode stops the whole batch.
    if line.input.is_full() {
        return if canonical { 1 } else { 0 };
    }

    if canonical {
        // 6. ICANON editing
        if cc_is(line, CC::VERASE, ch) {
            back_over(line);
            if !lflag.contains(LFlags::ECHOE) {
                rawecho(line, ch);
            }
            return 1;
        }
        if cc_is(line, CC::VKILL, ch) {
            while back_over(line) != 0 {}
            if !lflag.contains(LFlags::ECHOE) {
                rawecho(line, ch);
                if lflag.contains(LFlags::ECHOK) {
                    rawecho(line, b'\n');
                }
            }
            return 1;
        }
    }

    // 7. IXON flow control
    if iflag.contains(IFlags::IXON) {
        if cc_is(line, CC::VSTOP, ch) {
            line.inhibited = true;
            line.raise_events();
            return 1;
        }
        if line.inhibited {
            if cc_is(line, CC::VSTART, ch) || iflag.contains(IFlags::IXANY) {
                line.inhibited = false;
                line.raise_events();
            }
            if cc_is(line, CC::VSTART, ch) {
                return 1;
            }
        }
    }

    // 8. ISIG (independent of ICANON: raw mode still generates signals)
    if lflag.contains(LFlags::ISIG) {
        let signal = if cc_is(line, CC::VINTR, ch) {
            Some(Signal::Sigint)
        } else if cc_is(line, CC::VQUIT, ch) {
            Some(Signal::Sigquit)
        } else {
            None
        };
        if let Some(signal) = signal {
            if let Some(pgrp) = line.pgrp {
                line.signal_sender.send(pgrp, signal);
            }
            tty_echo(line, ch, false);
            if !lflag.contains(LFlags::NOFLSH) {
                line.input.clear();
                line.output.clear();
            }
            return 1;
        }
    }

    let mut word = InputWord::new(ch);

    if canonical {
        let is_eof = cc_is(line, CC::VEOF, ch);
        let is_eol = ch == b'\n' || cc_is(line, CC::VEOL, ch)
            || (lflag.contains(LFlags::IEXTEN) && cc_is(line, CC::VEOL2, ch));
        if is_eof {
            word.flags |= WordFlags::EOT | WordFlags::EOF;
        } else if is_eol {
            word.flags |= WordFlags::EOT;
        }
    } else {
        // 10. Raw mode: every stored byte is EOT-tagged.
        word.flags |= WordFlags::EOT;
        let vmin = line.termios.raw_vmin();
        let vtime = line.termios.raw_vtime();
        if vmin > 0 && vtime > 0 && !line.read_timer_armed {
            if let Some(slot) = line.read_slot.as_mut() {
                slot.timer = Some(timers.arm(clock, line_idx, Duration::from_millis(vtime as u64 * 100)));
                line.read_timer_armed = true;
            }
        }
    }

    // 11. Echo
    let is_eot_lf = word.flags.contains(WordFlags::EOT) && ch == b'\n';
    word.len = tty_echo(line, ch, is_eot_lf);

    enqueue(line, word);
    if line.input.is_full() {
        crate::in_transfer::in_transfer(line);
    }

    1
}

fn enqueue(line: &mut Line, word: InputWord) {
    line.input.push_back(word);
    line.raise_events();
}
