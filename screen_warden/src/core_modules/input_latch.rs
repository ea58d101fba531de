// THEORY:
// Human-input events arrive on an arbitrary listener thread at any rate; the tick
// reads them once a second. A plain boolean that the tick clears would race: an
// event landing between the tick's read and its clear would be wiped out.
//
// The latch therefore counts events instead of flagging them. The tick captures
// the count it saw and, when it consumes input, records exactly that count as
// seen. Anything that arrived after the capture is still pending next tick.
//
// Signalling is a single atomic increment and never blocks. A disarmed latch
// (master switch off) drops events on the floor.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug)]
pub struct InputLatch {
    armed: AtomicBool,
    events: AtomicU64,
    consumed: AtomicU64,
}

/// What a tick saw when it looked at the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputObservation {
    observed: u64,
    pub active: bool,
}

impl Default for InputLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl InputLatch {
    pub fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
            events: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
        }
    }

    /// Records one input event. Safe to call from any thread.
    pub fn signal(&self) {
        if self.armed.load(Ordering::Acquire) {
            self.events.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn observe(&self) -> InputObservation {
        let observed = self.events.load(Ordering::Acquire);
        InputObservation {
            observed,
            active: observed != self.consumed.load(Ordering::Acquire),
        }
    }

    /// Marks everything up to `observation` as seen. Later events stay pending.
    pub fn consume(&self, observation: InputObservation) {
        self.consumed.fetch_max(observation.observed, Ordering::AcqRel);
    }

    /// Arms or disarms the latch. Disarming also drops anything pending.
    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
        if !armed {
            self.consumed
                .fetch_max(self.events.load(Ordering::Acquire), Ordering::AcqRel);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}
