// SPDX-License-Identifier: MPL-2.0

//! Process-group signal delivery. The driver only ever needs to fire
//! one of four signals at a recorded `pgrp`; the actual delivery
//! mechanism lives outside this crate's scope, so it's modeled as a
//! narrow trait rather than a concrete process-signaling call.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sigint,
    Sigquit,
    Sighup,
    Sigwinch,
}

pub trait SignalSender: Send {
    fn send(&self, pgrp: u32, signal: Signal);
}

/// Stand-in used by tests and the demo binary: records every signal it
/// was asked to deliver instead of doing anything with it.
#[derive(Default)]
pub struct RecordingSignalSender {
    pub sent: std::sync::Mutex<Vec<(u32, Signal)>>,
}

impl SignalSender for RecordingSignalSender {
    fn send(&self, pgrp: u32, signal: Signal) {
        self.sent.lock().unwrap().push((pgrp, signal));
    }
}
