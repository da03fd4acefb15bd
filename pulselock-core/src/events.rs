//! Sync Observability Events
//!
//! ## Overview
//!
//! The original firmware interleaved debug prints with the sync logic.
//! Here the core stays transport-free: every interesting state change is
//! recorded as a small [`SyncEvent`] in a bounded ring that the host
//! drains at its leisure. A host that doesn't care simply never drains.
//!
//! ## Why a Ring and Not a Callback?
//!
//! Sync can be lost inside the pulse interrupt. Calling arbitrary host
//! code from interrupt context would put the host's latency budget inside
//! our handler; pushing a `Copy` event into a fixed ring keeps the
//! handler bounded and lets the host consume events in task context.
//!
//! ## Overflow Behavior
//!
//! When the ring is full the oldest event is dropped and a counter is
//! bumped. Recent history is what matters for diagnosing a sync flap, so
//! newest-wins is the right trade.

use heapless::Deque;

use crate::clock::WallClock;
use crate::errors::RejectReason;

/// A state change or policy decision worth reporting to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncEvent {
    /// A validated candidate anchored the clock; ticking resumes on the
    /// next pulse.
    SyncAcquired {
        /// The wall time the clock was anchored to.
        time: WallClock,
    },
    /// A missed or stale pulse demoted the system to unsynced.
    SyncLost {
        /// Observed gap since the previous pulse, in microseconds.
        pulse_age_us: u32,
    },
    /// A decoded candidate was not trustworthy enough to anchor.
    CandidateRejected {
        /// Why the candidate was turned down.
        reason: RejectReason,
    },
}

/// Bounded event ring with newest-wins overflow.
///
/// Lives inside the shared clock state, so pushes from the interrupt path
/// and pops from the control path are already serialized by the masked
/// section; the ring itself needs no synchronization.
#[derive(Debug)]
pub struct EventRing<const N: usize> {
    events: Deque<SyncEvent, N>,
    dropped: u32,
}

impl<const N: usize> EventRing<N> {
    /// Empty ring, usable in const/static contexts.
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Record an event, evicting the oldest one when full.
    pub fn push(&mut self, event: SyncEvent) {
        if self.events.is_full() {
            self.events.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Cannot fail: a slot was just freed if the ring was full.
        let _ = self.events.push_back(event);
    }

    /// Take the oldest recorded event.
    pub fn pop(&mut self) -> Option<SyncEvent> {
        self.events.pop_front()
    }

    /// Number of events evicted due to overflow.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Number of events currently buffered.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<const N: usize> Default for EventRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lost(age: u32) -> SyncEvent {
        SyncEvent::SyncLost { pulse_age_us: age }
    }

    #[test]
    fn fifo_order() {
        let mut ring: EventRing<4> = EventRing::new();
        ring.push(lost(1));
        ring.push(lost(2));
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.pop(), Some(lost(1)));
        assert_eq!(ring.pop(), Some(lost(2)));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn overflow_keeps_newest() {
        let mut ring: EventRing<2> = EventRing::new();
        ring.push(lost(1));
        ring.push(lost(2));
        ring.push(lost(3));
        assert_eq!(ring.dropped(), 1);
        assert_eq!(ring.pop(), Some(lost(2)));
        assert_eq!(ring.pop(), Some(lost(3)));
        assert!(ring.is_empty());
    }
}
