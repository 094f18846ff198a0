// SPDX-License-Identifier: MPL-2.0

//! Delivery of ready bytes from the input ring to a suspended reader.

use crate::line::Line;

const BOUNCE_SIZE: usize = 64;

/// Attempts to satisfy the line's pending read. Returns `true` if the
/// slot completed (caller should reply/revive); `false` if it is still
/// waiting on more input.
///
/// Delivers when `inleft > 0 AND eotct >= min`. In canonical mode,
/// delivery stops at and includes the EOT word, ending the call on the
/// line boundary. EOF-tagged words are consumed but never copied to the
/// user buffer. `min == 0` means "deliver whatever is present, even zero
/// bytes" (VTIME-only timeout, hangup).
pub fn in_transfer(line: &mut Line) -> bool {
    let canonical = line.termios.is_canonical();
    let hangup = line.termios.is_hangup();

    let Some(slot) = line.read_slot.as_mut() else {
        return false;
    };

    if hangup {
        slot.min = 0;
    }

    if slot.left == 0 {
        return true;
    }

    if line.input.eotct() < slot.min as usize {
        return false;
    }

    loop {
        if slot.left == 0 {
            break;
        }

        let mut bounce = [0u8; BOUNCE_SIZE];
        let mut n = 0;
        let mut done = false;

        while n < bounce.len() && slot.left > 0 {
            let Some(word) = line.input.peek_front() else {
                done = true;
                break;
            };
            line.input.pop_front();
            if word.is_eof() {
                done = true;
                break;
            }
            bounce[n] = word.ch;
            n += 1;
            slot.left -= 1;
            if canonical && word.is_eot() {
                done = true;
                break;
            }
        }

        if n > 0 {
            let cum = line.read_slot.as_ref().unwrap().cum;
            let result = line.read_slot.as_mut().unwrap().mem.copy_to_user(cum, &bounce[..n]);
            let slot = line.read_slot.as_mut().unwrap();
            match result {
                Ok(()) => slot.cum += n,
                Err(err) => {
                    slot.fault = Some(err);
                    slot.left = 0;
                    break;
                }
            }
        }

        if done {
            line.read_slot.as_mut().unwrap().left = 0;
            break;
        }
        if n == 0 {
            break;
        }
    }

    line.read_slot.as_ref().map(|s| s.left == 0).unwrap_or(true)
}
