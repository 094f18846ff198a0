// SPDX-License-Identifier: MPL-2.0

//! The device output pipeline: a queue of raw bytes awaiting
//! post-processing (`pending`) feeding a queue of post-processed bytes
//! awaiting the back-end drain (`ready`). See `out_process` for the
//! column/translation semantics and DESIGN.md for why this is two
//! logical queues instead of one physically-aliased ring.

use std::collections::VecDeque;

use crate::out_process::out_process;
use crate::termios::OFlags;

pub struct OutputRing {
    pending: VecDeque<u8>,
    ready: VecDeque<u8>,
    ready_capacity: usize,
    pub position: u16,
}

impl OutputRing {
    pub fn new(ready_capacity: usize) -> Self {
        OutputRing {
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            ready_capacity,
            position: 0,
        }
    }

    /// Queues raw bytes from a `write` request. Returns the number
    /// actually accepted (unbounded here; back-pressure is expressed
    /// through `ready` filling up during `process`).
    pub fn queue(&mut self, bytes: &[u8]) -> usize {
        self.pending.extend(bytes.iter().copied());
        bytes.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Runs `out_process` over as much of `pending` as fits in the
    /// remaining `ready` budget. Returns `(consumed, produced)`.
    pub fn process(&mut self, oflag: OFlags) -> (usize, usize) {
        let free = self.ready_capacity.saturating_sub(self.ready.len());
        if free == 0 || self.pending.is_empty() {
            return (0, 0);
        }
        let (input, _) = self.pending.as_slices();
        let input = if input.len() < self.pending.len() {
            // Wrapped storage: materialize a contiguous view.
            self.pending.iter().copied().collect::<Vec<u8>>()
        } else {
            input.to_vec()
        };
        let mut out = Vec::new();
        let (consumed, produced) = out_process(&input, &mut out, free, oflag, &mut self.position);
        for _ in 0..consumed {
            self.pending.pop_front();
        }
        self.ready.extend(out);
        (consumed, produced)
    }

    /// Drains up to `max` post-processed bytes for the back-end to send.
    pub fn drain_ready(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.ready.len());
        self.ready.drain(..n).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.ready.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_process_drain_round_trip() {
        let mut ring = OutputRing::new(64);
        ring.queue(b"hi\n");
        let (consumed, produced) = ring.process(OFlags::OPOST | OFlags::ONLCR);
        assert_eq!(consumed, 3);
        assert_eq!(produced, 4);
        let out = ring.drain_ready(100);
        assert_eq!(out, b"hi\r\n");
    }

    #[test]
    fn process_stops_when_ready_capacity_exhausted() {
        let mut ring = OutputRing::new(1);
        ring.queue(b"\n"); // needs 2 slots under ONLCR
        let (consumed, produced) = ring.process(OFlags::OPOST | OFlags::ONLCR);
        assert_eq!(consumed, 0);
        assert_eq!(produced, 0);
        assert_eq!(ring.pending_len(), 1);
    }
}
