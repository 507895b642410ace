// SPDX-License-Identifier: GPL-3.0-only
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::event::EventId;

static SHARED: Mutex<Weak<EventIdClock>> = parking_lot::const_mutex(Weak::new());

/// Last identifier issued by any incarnation of the process-wide clock.
static HIGH_WATER: AtomicU64 = AtomicU64::new(0);

/// Source of event identifiers.
///
/// Streams normally share one process-wide clock, created when the first
/// stream starts and torn down when the last one releases it. A recreated
/// clock resumes after the highest identifier issued so far, so ids never go
/// backwards within a process. Identifiers increase by one per event; after
/// `u64::MAX` the counter restarts at 1 and the epoch advances, which
/// delivery reports as `EVENT_IDS_WRAPPED`.
#[derive(Debug)]
pub struct EventIdClock {
    state: Mutex<ClockState>,
    process_wide: bool,
}

#[derive(Debug)]
struct ClockState {
    next: EventId,
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp {
    pub id: EventId,
    pub epoch: u64,
}

impl EventIdClock {
    /// The process-wide clock, creating it if no stream currently holds it.
    pub fn shared() -> Arc<Self> {
        let mut slot = SHARED.lock();
        if let Some(clock) = slot.upgrade() {
            return clock;
        }
        let last = HIGH_WATER.load(Ordering::Acquire);
        let (next, epoch) = match last.checked_add(1) {
            Some(next) => (next, 0),
            None => (1, 1),
        };
        let clock = Arc::new(Self {
            state: Mutex::new(ClockState { next, epoch }),
            process_wide: true,
        });
        *slot = Arc::downgrade(&clock);
        debug!(next, "Initialized process-wide event id clock");
        clock
    }

    /// A private clock whose first identifier is `first`.
    pub fn starting_at(first: EventId) -> Self {
        Self {
            state: Mutex::new(ClockState {
                next: first.max(1),
                epoch: 0,
            }),
            process_wide: false,
        }
    }

    /// The most recently issued identifier, or 0 if none was issued yet.
    pub fn current(&self) -> EventId {
        self.state.lock().next.wrapping_sub(1)
    }

    pub(crate) fn next(&self) -> Stamp {
        let mut state = self.state.lock();
        let stamp = Stamp {
            id: state.next,
            epoch: state.epoch,
        };
        state.next = match state.next.checked_add(1) {
            Some(next) => next,
            None => {
                state.epoch += 1;
                1
            }
        };
        if self.process_wide {
            HIGH_WATER.store(stamp.id, Ordering::Release);
        }
        stamp
    }
}

/// Latest identifier issued by the process-wide clock, whether or not any
/// stream is currently running. 0 until the first event.
pub fn latest_event_id() -> EventId {
    HIGH_WATER.load(Ordering::Acquire)
}
