// SPDX-License-Identifier: MPL-2.0

//! Output post-processing: newline translation, tab expansion, and
//! column tracking, applied to a pending byte run.
//!
//! A one-buffer design where output overwrites input at the same
//! indices in place is possible here too, but keeping the externally
//! observable semantics (column tracking, BEL/BS/CR handling,
//! CRNL/XTABS stop-on-overflow) over two logical queues (`pending` ->
//! `ready`) avoids `unsafe` pointer aliasing for no test-visible
//! benefit. See DESIGN.md.

use crate::termios::{OFlags, TAB_MASK, TAB_SIZE};

/// Post-processes `input`, writing up to `ocount` produced bytes into
/// `out`. Returns `(consumed, produced)`. Stops early if consuming the
/// next input byte would require more output room than remains in
/// `ocount`, or once `input` is exhausted.
pub fn out_process(
    input: &[u8],
    out: &mut Vec<u8>,
    ocount: usize,
    oflag: OFlags,
    position: &mut u16,
) -> (usize, usize) {
    let mut consumed = 0;
    let mut produced = 0;
    let opost = oflag.contains(OFlags::OPOST);

    for &ch in input {
        match ch {
            0x07 => {
                // BEL: no column change, always fits (one byte).
                if produced + 1 > ocount {
                    break;
                }
                out.push(ch);
                produced += 1;
            }
            0x08 => {
                if produced + 1 > ocount {
                    break;
                }
                *position = position.saturating_sub(1);
                out.push(ch);
                produced += 1;
            }
            b'\r' => {
                if produced + 1 > ocount {
                    break;
                }
                *position = 0;
                out.push(ch);
                produced += 1;
            }
            b'\n' if opost && oflag.contains(OFlags::ONLCR) => {
                if produced + 2 > ocount {
                    break;
                }
                out.push(b'\r');
                out.push(b'\n');
                produced += 2;
                *position = 0;
            }
            b'\t' => {
                let width = TAB_SIZE - (*position & TAB_MASK);
                if opost && oflag.contains(OFlags::XTABS) {
                    if produced + width as usize > ocount {
                        break;
                    }
                    for _ in 0..width {
                        out.push(b' ');
                    }
                    produced += width as usize;
                } else {
                    if produced + 1 > ocount {
                        break;
                    }
                    out.push(ch);
                    produced += 1;
                }
                *position = (*position + width) % TAB_SIZE;
                consumed += 1;
                continue;
            }
            _ => {
                if produced + 1 > ocount {
                    break;
                }
                out.push(ch);
                produced += 1;
                *position = (*position + 1) % TAB_SIZE;
            }
        }
        consumed += 1;
    }

    (consumed, produced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_expansion_matches_scenario() {
        let oflag = OFlags::OPOST | OFlags::XTABS;
        let mut position = 3u16;
        let mut out = Vec::new();
        let (consumed, produced) = out_process(b"\tx", &mut out, 6, oflag, &mut position);
        assert_eq!(consumed, 2);
        assert_eq!(produced, 6);
        assert_eq!(out, b"     x");
        assert_eq!(position, 1);
    }

    #[test]
    fn crnl_translation_requires_two_slots() {
        let oflag = OFlags::OPOST | OFlags::ONLCR;
        let mut position = 0u16;
        let mut out = Vec::new();
        let (consumed, produced) = out_process(b"\n", &mut out, 1, oflag, &mut position);
        assert_eq!(consumed, 0);
        assert_eq!(produced, 0);
        assert!(out.is_empty());

        let mut out = Vec::new();
        let (consumed, produced) = out_process(b"\n", &mut out, 2, oflag, &mut position);
        assert_eq!(consumed, 1);
        assert_eq!(produced, 2);
        assert_eq!(out, b"\r\n");
        assert_eq!(position, 0);
    }

    #[test]
    fn position_wraps_modulo_tab_size() {
        let oflag = OFlags::empty();
        let mut position = 0u16;
        let mut out = Vec::new();
        out_process(b"abcdefghij", &mut out, 100, oflag, &mut position);
        assert!(position < TAB_SIZE);
        assert_eq!(position, 10 % TAB_SIZE);
    }

    #[test]
    fn backspace_decrements_position() {
        let oflag = OFlags::empty();
        let mut position = 3u16;
        let mut out = Vec::new();
        out_process(b"\x08", &mut out, 1, oflag, &mut position);
        assert_eq!(position, 2);
    }
}
