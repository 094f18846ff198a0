// SPDX-License-Identifier: MPL-2.0

//! The global timer set, used exclusively for VMIN/VTIME read
//! timeouts. Generic over a `Clock` so tests can control time without
//! sleeping.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
}

/// The clock backed by the real monotonic OS clock; stands in for
/// `sys_getuptime`.
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

struct Entry {
    expires_at: Instant,
    line_idx: usize,
}

/// A single ordered set of per-line timers: a sorted set of absolute
/// expiry times, with the owner registering one timer per line. The
/// "callback" here is the dispatcher re-checking the owning line after
/// `expire_due` reports it, rather than a boxed closure, since the only
/// action a fired timer ever takes is forcing `min := 0` and raising
/// events, and baking that in avoids an indirection that's never needed.
#[derive(Default)]
pub struct TimerSet {
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

impl TimerSet {
    pub fn new() -> Self {
        TimerSet { next_id: 0, entries: BTreeMap::new() }
    }

    pub fn arm(&mut self, clock: &dyn Clock, line_idx: usize, after: Duration) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Entry { expires_at: clock.now() + after, line_idx });
        TimerHandle(id)
    }

    pub fn disarm(&mut self, handle: TimerHandle) {
        self.entries.remove(&handle.0);
    }

    /// Returns the line indices whose timers have expired as of `now`,
    /// removing those timers from the set.
    pub fn expire_due(&mut self, now: Instant) -> Vec<usize> {
        let due: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        let mut fired = Vec::with_capacity(due.len());
        for id in due {
            if let Some(entry) = self.entries.remove(&id) {
                fired.push(entry.line_idx);
            }
        }
        fired
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeClock(std::cell::Cell<Instant>);

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.0.get()
        }
    }

    #[test]
    fn timer_fires_after_duration_elapses() {
        let clock = FakeClock(std::cell::Cell::new(Instant::now()));
        let mut timers = TimerSet::new();
        let handle = timers.arm(&clock, 3, Duration::from_millis(100));
        assert!(timers.is_armed(handle));

        let fired = timers.expire_due(clock.now());
        assert!(fired.is_empty());

        clock.0.set(clock.now() + Duration::from_millis(150));
        let fired = timers.expire_due(clock.now());
        assert_eq!(fired, vec![3]);
        assert!(!timers.is_armed(handle));
    }

    #[test]
    fn disarm_removes_timer() {
        let clock = FakeClock(std::cell::Cell::new(Instant::now()));
        let mut timers = TimerSet::new();
        let handle = timers.arm(&clock, 0, Duration::from_millis(10));
        timers.disarm(handle);
        clock.0.set(clock.now() + Duration::from_millis(50));
        assert!(timers.expire_due(clock.now()).is_empty());
    }
}
