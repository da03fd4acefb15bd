//! Shared Clock State Across the Interrupt Boundary
//!
//! ## Overview
//!
//! Three data cross the boundary between the pulse interrupt and the
//! cooperative control loop: the wall clock, the synced flag, and the
//! arrival time of the most recent pulse edge. They are a tearing-hazard
//! group - observing half of one while the handler rewrites the other half
//! would corrupt age computations - so all three live inside a single
//! [`critical_section::Mutex`] and every access goes through one short
//! masked section.
//!
//! ## Concurrency Model
//!
//! One preemptive interrupt context (the pulse handler) and one
//! cooperative control context share a core with no true parallelism.
//! `critical_section::with` is the scoped-acquisition primitive: acquire,
//! do the minimal read or write, release on scope exit. There are no
//! ad-hoc mask/unmask pairs anywhere in the crate. On single-core targets
//! the critical-section implementation is the interrupt mask itself, so
//! the handler also cannot be preempted by a second edge mid-update (the
//! line is debounced in hardware).
//!
//! ## Writer Discipline
//!
//! - The wall clock advances only in [`SharedClock::on_pulse`] and is
//!   overwritten only in [`SharedClock::anchor`]; the two cannot run
//!   concurrently because both hold the critical section.
//! - The synced flag changes only through the private transition function,
//!   which also drives the physical indicator. The indicator is owned by
//!   this state object for exactly that reason: no other code path can
//!   touch it, so flag and LED can never disagree.
//!
//! ## Registration
//!
//! There is no hidden singleton. The host owns a `SharedClock` (usually in
//! a `static`, since ISR callback slots want `'static` borrows) and
//! registers a closure over it as the rising-edge handler:
//!
//! ```ignore
//! static CLOCK: SharedClock<Led> = SharedClock::new(Led::off());
//!
//! // in the PPS edge ISR:
//! CLOCK.on_pulse(timer.now_us());
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::clock::WallClock;
use crate::constants::{EVENT_RING_DEPTH, PULSE_TIMEOUT_US};
use crate::errors::RejectReason;
use crate::events::{EventRing, SyncEvent};
use crate::traits::{Candidate, MonotonicClock, SyncIndicator};

/// Everything guarded by the masked section.
struct Inner<I: SyncIndicator> {
    time: WallClock,
    synced: bool,
    /// Monotonic-us arrival of the latest pulse edge; `None` until the
    /// first edge after boot.
    last_pulse_us: Option<u32>,
    events: EventRing<EVENT_RING_DEPTH>,
    indicator: I,
}

impl<I: SyncIndicator> Inner<I> {
    /// The single transition function for the synced flag.
    ///
    /// Flips the flag and the indicator together; returns whether a
    /// logical transition actually happened so callers emit each event
    /// exactly once, not once per call.
    fn update_sync_status(&mut self, synced: bool) -> bool {
        if self.synced == synced {
            return false;
        }
        self.synced = synced;
        self.indicator.set_locked(synced);
        true
    }
}

/// The clock state shared between the pulse interrupt and the control
/// loop.
///
/// All methods take `&self` and are safe to call from either context;
/// each one holds the critical section only for the few instructions it
/// needs.
pub struct SharedClock<I: SyncIndicator> {
    inner: Mutex<RefCell<Inner<I>>>,
}

impl<I: SyncIndicator> SharedClock<I> {
    /// Fresh state: midnight, unsynced, no pulse observed.
    ///
    /// `indicator` should be handed over in the "off" state; it is first
    /// driven on the first sync transition.
    pub const fn new(indicator: I) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                time: WallClock::MIDNIGHT,
                synced: false,
                last_pulse_us: None,
                events: EventRing::new(),
                indicator,
            })),
        }
    }

    /// Pulse-edge handler. Call from the rising-edge ISR with the
    /// monotonic timestamp read at entry.
    ///
    /// While synced: a gap of [`PULSE_TIMEOUT_US`] or more means a pulse
    /// was skipped, so the system demotes itself instead of ticking; any
    /// shorter gap advances the clock by exactly one second. While
    /// unsynced the edge only records its arrival time - the very first
    /// pulse after boot or after a sync loss never advances the clock.
    pub fn on_pulse(&self, now_us: u32) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.synced {
                if let Some(last) = inner.last_pulse_us {
                    let age = now_us.wrapping_sub(last);
                    if age >= PULSE_TIMEOUT_US {
                        if inner.update_sync_status(false) {
                            inner.events.push(SyncEvent::SyncLost { pulse_age_us: age });
                        }
                    } else {
                        inner.time.tick();
                    }
                }
            }
            inner.last_pulse_us = Some(now_us);
        });
    }

    /// Age of the latest pulse edge, or `None` before the first edge.
    ///
    /// The clock is sampled inside the masked section so the handler
    /// cannot slip a newer edge in between the two reads, which would
    /// make the subtraction go backwards.
    pub fn pulse_age_us(&self, clock: &impl MonotonicClock) -> Option<u32> {
        let (now, last) = critical_section::with(|cs| {
            let inner = self.inner.borrow_ref(cs);
            (clock.now_us(), inner.last_pulse_us)
        });
        last.map(|last| now.wrapping_sub(last))
    }

    /// Anchor the clock to a validated candidate and mark it synced.
    ///
    /// Call only with a candidate that passed
    /// [`validate_candidate`](crate::controller::validate_candidate):
    /// anchoring establishes that the *next* pulse edge is the first tick
    /// of `candidate`'s second. Always overwrites the time and asserts the
    /// synced state, even when already synced; the acquisition event fires
    /// only on an actual transition.
    pub fn anchor(&self, candidate: &Candidate) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.time = candidate.wall_clock();
            if inner.update_sync_status(true) {
                let time = inner.time;
                inner.events.push(SyncEvent::SyncAcquired { time });
            }
        });
    }

    /// Demote to unsynced after the control loop observed a stale pulse.
    ///
    /// Mirrors the handler's missed-pulse branch for the case where the
    /// control loop notices staleness before the next interrupt would
    /// have. No-op when already unsynced.
    pub fn force_unsync(&self, pulse_age_us: u32) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.update_sync_status(false) {
                inner.events.push(SyncEvent::SyncLost { pulse_age_us });
            }
        });
    }

    /// Whether the clock is currently disciplined to the pulse. Pure
    /// read, no side effects.
    pub fn is_synced(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).synced)
    }

    /// Consistent snapshot of the current wall time.
    ///
    /// Only meaningful while [`is_synced`](Self::is_synced) returns true;
    /// callers are expected to check.
    pub fn time(&self) -> WallClock {
        critical_section::with(|cs| self.inner.borrow_ref(cs).time)
    }

    /// Field-wise comparison of the current time against `other`.
    ///
    /// Lets callers detect "clock changed since I last looked" without a
    /// tick counter. With no date tracked, readings exactly 24 h apart
    /// compare equal.
    pub fn time_equals(&self, other: &WallClock) -> bool {
        self.time() == *other
    }

    /// Record a candidate rejection for the host to observe.
    pub fn note_rejection(&self, reason: RejectReason) {
        critical_section::with(|cs| {
            self.inner
                .borrow_ref_mut(cs)
                .events
                .push(SyncEvent::CandidateRejected { reason });
        });
    }

    /// Drain one observability event, oldest first.
    pub fn pop_event(&self) -> Option<SyncEvent> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).events.pop())
    }

    /// Events lost to ring overflow since boot.
    pub fn events_dropped(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow_ref(cs).events.dropped())
    }
}
