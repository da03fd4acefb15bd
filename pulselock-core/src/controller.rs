//! Sync-Control Loop and Candidate Validation Policy
//!
//! ## Overview
//!
//! The control loop is the cooperative half of the subsystem. Called
//! periodically from the host's main loop, it keeps asking "are we still
//! synced?" and, while not, works toward a fresh anchor: drain serial
//! bytes into the sentence decoder for one bounded window, take at most
//! one candidate timestamp, and accept it only if it unambiguously
//! identifies which pulse edge is "second zero".
//!
//! ## The Pairing Problem
//!
//! A timestamp sentence tells us what time it *was* `age_ms` milliseconds
//! before decode completion. To anchor, we must know which pulse edge
//! that moment belongs to:
//!
//! ```text
//!  pulse n                                pulse n+1
//!    |<-- margin -->|   accept    |<-- margin -->|
//!    |▒▒▒▒▒▒▒▒▒▒▒▒▒▒|█████████████|▒▒▒▒▒▒▒▒▒▒▒▒▒▒|
//!    0            5 ms                995 ms    1 s
//! ```
//!
//! A candidate is accepted only when the moment it describes falls
//! strictly inside the unshaded region: far enough after the last edge
//! that it cannot describe that edge or earlier, and far enough before
//! the next that jitter cannot cost a tick. Everything else waits for the
//! next sentence - rejecting a good candidate costs one second of
//! acquisition time, accepting a bad one corrupts every reading until
//! somebody notices.
//!
//! ## State Machine
//!
//! Two states, three transitions:
//!
//! ```text
//! Unsynced --accept(candidate)--------------------> Synced
//! Synced   --missed pulse / stale pulse observed--> Unsynced
//! Synced   --confirmed pulse--> Synced (clock advances)
//! ```
//!
//! Re-acquisition always goes back through Unsynced; there is no other
//! path.

use crate::constants::{DEFAULT_DRAIN_WINDOW_US, PULSE_PERIOD_US, PULSE_TIMEOUT_US, SAFETY_MARGIN_US};
use crate::errors::RejectReason;
use crate::state::SharedClock;
use crate::traits::{Candidate, MonotonicClock, SerialSource, SyncIndicator, TimestampDecoder};

/// Tunables for the control loop.
///
/// The 1.5 s pulse timeout is deliberately *not* here: it is part of the
/// pulse contract and must agree between the interrupt path and the
/// control path, so it stays a crate constant
/// ([`PULSE_TIMEOUT_US`]).
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Upper bound on serial draining per control-loop pass, in
    /// microseconds.
    pub drain_window_us: u32,
    /// Safety distance kept to pulse edges on both sides, in
    /// microseconds.
    pub safety_margin_us: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drain_window_us: DEFAULT_DRAIN_WINDOW_US,
            safety_margin_us: SAFETY_MARGIN_US,
        }
    }
}

/// Decide whether a candidate timestamp can anchor the clock to the next
/// pulse.
///
/// Pure policy, evaluated in order:
/// 1. No fix at the source: reject.
/// 2. No pulse edge observed yet (`pulse_age_us` is `None`): there is
///    nothing to pair with, reject.
/// 3. The candidate's declared age reaches back to within
///    `safety_margin_us` of the last edge or beyond it: it may describe
///    that edge's second or an earlier one, reject.
/// 4. The next edge is due within `safety_margin_us`: pairing could lose
///    a tick to jitter, reject.
///
/// Both comparisons are non-strict, so a candidate sitting exactly on a
/// boundary is rejected. The age product saturates: an enormous declared
/// age stays an "old timestamp" instead of wrapping into a plausible one.
pub fn validate_candidate(
    pulse_age_us: Option<u32>,
    candidate: &Candidate,
    config: &SyncConfig,
) -> Result<(), RejectReason> {
    if !candidate.has_fix() {
        return Err(RejectReason::NoFix);
    }
    let pulse_age_us = pulse_age_us.ok_or(RejectReason::NoPulseSeen)?;

    let oldest_usable = candidate
        .age_ms
        .saturating_mul(1_000)
        .saturating_add(config.safety_margin_us);
    if pulse_age_us <= oldest_usable {
        return Err(RejectReason::TimestampTooOld {
            age_ms: candidate.age_ms,
            pulse_age_us,
        });
    }
    if pulse_age_us >= PULSE_PERIOD_US - config.safety_margin_us {
        return Err(RejectReason::TooCloseToNextPulse { pulse_age_us });
    }
    Ok(())
}

/// The polled sync-control loop.
///
/// Owns the serial source and the decoder; borrows the shared clock state
/// that the pulse interrupt also sees. The host calls
/// [`sync_to_reference`](Self::sync_to_reference) periodically; each call
/// returns within one drain window.
pub struct SyncController<'a, I, C, S, D>
where
    I: SyncIndicator,
    C: MonotonicClock,
    S: SerialSource,
    D: TimestampDecoder,
{
    shared: &'a SharedClock<I>,
    clock: C,
    serial: S,
    decoder: D,
    config: SyncConfig,
}

impl<'a, I, C, S, D> SyncController<'a, I, C, S, D>
where
    I: SyncIndicator,
    C: MonotonicClock,
    S: SerialSource,
    D: TimestampDecoder,
{
    /// Controller with default timing ([`SyncConfig::default`]).
    pub fn new(shared: &'a SharedClock<I>, clock: C, serial: S, decoder: D) -> Self {
        Self::with_config(shared, clock, serial, decoder, SyncConfig::default())
    }

    /// Controller with custom drain window and safety margin.
    pub fn with_config(
        shared: &'a SharedClock<I>,
        clock: C,
        serial: S,
        decoder: D,
        config: SyncConfig,
    ) -> Self {
        Self { shared, clock, serial, decoder, config }
    }

    /// One pass of the control loop.
    ///
    /// Unsynced: drain serial into the decoder for at most one window,
    /// then attempt a single decode-validate-anchor cycle. Synced: verify
    /// the pulse is still fresh and demote if the interrupt path has not
    /// already done so. Rejections are recorded as events and retried on
    /// the next pass; there is nothing to return.
    pub fn sync_to_reference(&mut self) {
        let pulse_age = self.shared.pulse_age_us(&self.clock);

        if !self.shared.is_synced() {
            self.drain_serial();
            if let Some(candidate) = self.decoder.timestamp() {
                // Draining consumed wall time; pair against a fresh age.
                let pulse_age = self.shared.pulse_age_us(&self.clock);
                match validate_candidate(pulse_age, &candidate, &self.config) {
                    Ok(()) => {
                        self.shared.anchor(&candidate);
                        #[cfg(feature = "log")]
                        log::info!(
                            "anchored to {} ({} ms old, pulse {:?} us ago)",
                            candidate.wall_clock(),
                            candidate.age_ms,
                            pulse_age,
                        );
                    }
                    Err(reason) => {
                        self.shared.note_rejection(reason);
                        #[cfg(feature = "log")]
                        log::debug!("candidate rejected: {}", reason);
                    }
                }
            }
        } else if let Some(age) = pulse_age {
            if age >= PULSE_TIMEOUT_US {
                self.shared.force_unsync(age);
                #[cfg(feature = "log")]
                log::warn!("pulse stale for {} us, sync lost", age);
            }
        }
    }

    /// Whether the clock is currently disciplined. Pure read, safe to
    /// call from anywhere in the host loop.
    pub fn is_synced(&self) -> bool {
        self.shared.is_synced()
    }

    /// Snapshot of the current wall time (meaningful while synced).
    pub fn time(&self) -> crate::WallClock {
        self.shared.time()
    }

    /// The sentence decoder, e.g. for querying decoder statistics.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Mutable access to the sentence decoder.
    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    /// Feed buffered serial bytes to the decoder until the window
    /// elapses.
    ///
    /// Polls through `WouldBlock` for the whole window: sentences trickle
    /// in at serial pace, so an empty FIFO now does not mean an empty
    /// window. The window bounds the call even if the line babbles
    /// continuously.
    fn drain_serial(&mut self) {
        let start = self.clock.now_us();
        loop {
            match self.serial.read() {
                Ok(byte) => self.decoder.feed(byte),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(infallible)) => match infallible {},
            }
            if self.clock.now_us().wrapping_sub(start) >= self.config.drain_window_us {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INVALID_AGE_MS;
    use proptest::prelude::*;

    fn config() -> SyncConfig {
        SyncConfig::default()
    }

    fn candidate(age_ms: u32) -> Candidate {
        Candidate { hour: 12, minute: 0, second: 0, age_ms }
    }

    #[test]
    fn no_fix_always_rejected() {
        let c = candidate(INVALID_AGE_MS);
        for pulse_age in [None, Some(0), Some(500_000), Some(u32::MAX)] {
            assert_eq!(
                validate_candidate(pulse_age, &c, &config()),
                Err(RejectReason::NoFix),
            );
        }
    }

    #[test]
    fn no_pulse_rejected() {
        assert_eq!(
            validate_candidate(None, &candidate(100), &config()),
            Err(RejectReason::NoPulseSeen),
        );
    }

    #[test]
    fn midwindow_candidate_accepted() {
        // age 200 ms, pulse 800 ms ago: well inside the acceptance window
        assert!(validate_candidate(Some(800_000), &candidate(200), &config()).is_ok());
    }

    #[test]
    fn lower_boundary_rejects_non_strict() {
        // age 0: oldest usable offset is exactly the 5 ms margin
        let c = candidate(0);
        assert_eq!(
            validate_candidate(Some(5_000), &c, &config()),
            Err(RejectReason::TimestampTooOld { age_ms: 0, pulse_age_us: 5_000 }),
        );
        assert!(validate_candidate(Some(5_001), &c, &config()).is_ok());
    }

    #[test]
    fn upper_boundary_rejects_non_strict() {
        let c = candidate(0);
        assert_eq!(
            validate_candidate(Some(995_000), &c, &config()),
            Err(RejectReason::TooCloseToNextPulse { pulse_age_us: 995_000 }),
        );
        assert!(validate_candidate(Some(994_999), &c, &config()).is_ok());
    }

    #[test]
    fn old_timestamp_rejected() {
        // age 700 ms but pulse only 600 ms ago: describes the previous second
        assert_eq!(
            validate_candidate(Some(600_000), &candidate(700), &config()),
            Err(RejectReason::TimestampTooOld { age_ms: 700, pulse_age_us: 600_000 }),
        );
    }

    #[test]
    fn huge_age_saturates_instead_of_wrapping() {
        // age_ms * 1000 would overflow u32; must stay "too old"
        let c = candidate(5_000_000);
        assert!(matches!(
            validate_candidate(Some(800_000), &c, &config()),
            Err(RejectReason::TimestampTooOld { .. }),
        ));
    }

    proptest! {
        /// Acceptance is exactly: valid age AND
        /// pulse_age > age_ms*1000 + margin AND
        /// pulse_age < period - margin.
        #[test]
        fn acceptance_matches_predicate(
            pulse_age in 0u32..2_000_000,
            age_ms in 0u32..2_000,
        ) {
            let cfg = config();
            let c = candidate(age_ms);
            let expected = pulse_age as u64 > age_ms as u64 * 1_000 + 5_000
                && pulse_age < 995_000;
            let got = validate_candidate(Some(pulse_age), &c, &cfg).is_ok();
            prop_assert_eq!(got, expected);
        }
    }
}
