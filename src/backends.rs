// SPDX-License-Identifier: MPL-2.0

//! A demo/test back-end implementing `TtyOps`: a pair of byte queues,
//! one fed by the peer side, one drained by it, each guarded
//! independently rather than through one physical ring, in the shape of
//! a PTY master/slave channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::backend::TtyOps;
use crate::termios::Termios;

/// Shared byte queues a test or demo harness can feed/drain from outside
/// the driver, paired with the `TtyOps` impl the driver calls into.
#[derive(Clone, Default)]
pub struct LoopbackChannel {
    inbound: Arc<Mutex<VecDeque<u8>>>,
    outbound: Arc<Mutex<VecDeque<u8>>>,
    echoed: Arc<Mutex<Vec<u8>>>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes as if they arrived from the device side (keyboard,
    /// serial RX, PTY peer write).
    pub fn push_input(&self, bytes: &[u8]) {
        self.inbound.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Drains bytes the driver has sent to the device side.
    pub fn take_output(&self) -> Vec<u8> {
        self.outbound.lock().unwrap().drain(..).collect()
    }

    /// Drains bytes emitted through the echo path.
    pub fn take_echoed(&self) -> Vec<u8> {
        std::mem::take(&mut self.echoed.lock().unwrap())
    }

    pub fn backend(&self) -> LoopbackBackend {
        LoopbackBackend { channel: self.clone() }
    }
}

/// The `TtyOps` side of a `LoopbackChannel`, owned by one `Line`.
pub struct LoopbackBackend {
    channel: LoopbackChannel,
}

impl TtyOps for LoopbackBackend {
    fn read_bytes(&mut self) -> Vec<u8> {
        self.channel.inbound.lock().unwrap().drain(..).collect()
    }

    fn read_ready(&self) -> bool {
        !self.channel.inbound.lock().unwrap().is_empty()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        self.channel.outbound.lock().unwrap().extend(bytes.iter().copied());
        bytes.len()
    }

    fn write_ready(&self) -> bool {
        true
    }

    fn echo(&mut self, byte: u8) {
        self.channel.echoed.lock().unwrap().push(byte);
    }

    fn icancel(&mut self) {
        self.channel.inbound.lock().unwrap().clear();
    }

    fn ocancel(&mut self) {
        self.channel.outbound.lock().unwrap().clear();
    }

    fn ioctl(&mut self, _termios: &Termios) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_input_is_drained_by_read_bytes() {
        let channel = LoopbackChannel::new();
        let mut backend = channel.backend();
        channel.push_input(b"hi");
        assert!(backend.read_ready());
        assert_eq!(backend.read_bytes(), b"hi");
        assert!(!backend.read_ready());
    }

    #[test]
    fn written_bytes_are_visible_to_the_peer() {
        let channel = LoopbackChannel::new();
        let mut backend = channel.backend();
        backend.write_bytes(b"out");
        assert_eq!(channel.take_output(), b"out");
    }

    #[test]
    fn echo_is_recorded_separately_from_device_output() {
        let channel = LoopbackChannel::new();
        let mut backend = channel.backend();
        backend.echo(b'x');
        backend.write_bytes(b"y");
        assert_eq!(channel.take_echoed(), vec![b'x']);
        assert_eq!(channel.take_output(), b"y");
    }
}
