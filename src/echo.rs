// SPDX-License-Identifier: MPL-2.0

//! Echo/erase/reprint discipline.

use crate::line::Line;
use crate::ring::WordFlags;
use crate::termios::{LFlags, CC, TAB_MASK, TAB_SIZE};

/// Renders one echoed character through the line's back-end, updating
/// `position` and returning the visual width (`LEN`) the caller should
/// stamp onto the stored ring word.
///
/// If `ECHO` is off, still emits a bare LF when `ECHONL` is set and the
/// byte is a canonical-EOT newline; otherwise emits nothing.
pub fn tty_echo(line: &mut Line, ch: u8, is_eot_lf: bool) -> u8 {
    let lflag = line.termios.lflag;
    if !lflag.contains(LFlags::ECHO) {
        if is_eot_lf && lflag.contains(LFlags::ECHONL) {
            rawecho(line, b'\n');
        }
        return 0;
    }

    match ch {
        0x09 => {
            // TAB: emit spaces until position & TAB_MASK == 0.
            let width = TAB_SIZE - (line.position & TAB_MASK);
            for _ in 0..width {
                line.backend.echo(b' ');
            }
            line.position = 0;
            width as u8
        }
        b'\n' | b'\r' if is_eot_lf => {
            line.backend.echo(ch);
            line.position = 0;
            0
        }
        ch if ch < 0x20 => {
            line.backend.echo(b'^');
            line.backend.echo(b'@' + ch);
            2
        }
        0x7f => {
            line.backend.echo(b'^');
            line.backend.echo(b'?');
            2
        }
        ch => {
            line.backend.echo(ch);
            line.position = (line.position + 1) % TAB_SIZE;
            1
        }
    }
}

/// Echoes a byte unconditionally (bypassing the ECHO flag), used for
/// control renderings like the kill-then-LF sequence and VLNEXT's `^\b`.
pub fn rawecho(line: &mut Line, ch: u8) {
    line.backend.echo(ch);
    if ch == b'\n' || ch == b'\r' {
        line.position = 0;
    } else {
        line.position = (line.position + 1) % TAB_SIZE;
    }
}

/// Pops the newest non-EOT word from the input ring and, if `ECHOE`,
/// visually erases it (`\b \b` repeated `LEN` times). Returns `0` if the
/// ring is empty or the newest word is an EOT (line breaks are never
/// erased).
pub fn back_over(line: &mut Line) -> u8 {
    let Some(word) = line.input.pop_newest() else { return 0 };
    if line.termios.lflag.contains(LFlags::ECHOE) {
        for _ in 0..word.len {
            line.backend.echo(0x08);
            line.backend.echo(b' ');
            line.backend.echo(0x08);
        }
    }
    word.len
}

/// Re-echoes the not-yet-terminated current line: `VREPRINT`, `CR LF`,
/// then each stored word in order, recomputing each word's `LEN` since
/// rendering width may differ on re-echo. No-op if nothing has been typed
/// since the last EOT. Restores `reprint` to `false`.
pub fn reprint(line: &mut Line) {
    let offsets = line.input.offsets_since_last_eot();
    if offsets.is_empty() {
        line.reprint = false;
        return;
    }

    let vreprint = line.termios.cc(CC::VREPRINT);
    line.backend.echo(b'^');
    line.backend.echo(b'@' + (vreprint & 0x1f));
    rawecho(line, b'\r');
    rawecho(line, b'\n');

    for offset in offsets {
        let Some(word) = line.input.word_at(offset) else { continue };
        if word.flags.contains(WordFlags::EOF) {
            continue;
        }
        let len = tty_echo(line, word.ch, false);
        line.input.set_len_at(offset, len);
    }

    line.reprint = false;
}
