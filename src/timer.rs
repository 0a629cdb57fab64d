//! One-shot timers used for the payment accept window.
//!
//! Controllers never sleep. They ask a [`TimerService`] for a handle and
//! are told about expiry through their owner (`on_timer(handle)`). A handle
//! that is no longer the live one is ignored, so a firing that races a
//! cancellation is harmless.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Identifies one scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

/// Scheduler of one-shot timers.
pub trait TimerService: Send {
    /// Schedule a timer firing once after `delay`.
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Cancel a timer. Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

#[derive(Debug, Default)]
struct Clock {
    next: u64,
    now: Duration,
    pending: BTreeMap<TimerHandle, Duration>,
}

/// Deterministic timers driven by hand.
///
/// Clones share one clock, so a test keeps a clone while the kiosk owns the
/// other and moves time forward with [`ManualTimers::advance`].
///
/// # Example
///
/// ```rust
/// use cashflow::timer::{ManualTimers, TimerService};
/// use std::time::Duration;
///
/// let clock = ManualTimers::new();
/// let mut timers = clock.clone();
/// let handle = timers.schedule(Duration::from_secs(60));
///
/// assert!(clock.advance(Duration::from_secs(59)).is_empty());
/// assert_eq!(clock.advance(Duration::from_secs(1)), vec![handle]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualTimers {
    clock: Arc<Mutex<Clock>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move time forward and return the timers that expired, oldest first.
    pub fn advance(&self, by: Duration) -> Vec<TimerHandle> {
        let mut clock = self.clock();
        clock.now += by;
        let now = clock.now;
        let mut due: Vec<(Duration, TimerHandle)> = clock
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(handle, deadline)| (*deadline, *handle))
            .collect();
        due.sort();
        for (_, handle) in &due {
            clock.pending.remove(handle);
        }
        due.into_iter().map(|(_, handle)| handle).collect()
    }

    /// Timers scheduled and neither fired nor cancelled.
    pub fn pending(&self) -> Vec<TimerHandle> {
        self.clock().pending.keys().copied().collect()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.clock().pending.contains_key(&handle)
    }
}

impl TimerService for ManualTimers {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        let mut clock = self.clock();
        clock.next += 1;
        let handle = TimerHandle(clock.next);
        let deadline = clock.now + delay;
        clock.pending.insert(handle, deadline);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.clock().pending.remove(&handle);
    }
}
