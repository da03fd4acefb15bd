//! Rejection Reasons for Candidate Timestamps
//!
//! ## Design Philosophy
//!
//! Nothing in this subsystem is a fatal error. The only failures are a
//! missing fix and timestamps that cannot be unambiguously paired with a
//! pulse edge, and both are ordinary policy outcomes: the system stays
//! unsynced and retries on the next control-loop pass. Callers learn about
//! overall health through `is_synced()`, never through a fallible return.
//!
//! The reasons are still modeled as a proper error enum because they are
//! carried inside observability events and logged, and because the
//! validation policy reads naturally as `Result<(), RejectReason>`:
//!
//! 1. **Small Size**: every variant is a couple of words, cheap to copy
//!    through the event ring.
//! 2. **No Heap Allocation**: all data is inline, deterministic memory.
//! 3. **Copy Semantics**: reasons move freely between the control loop,
//!    the event ring, and log lines.
//!
//! ## Reason Categories
//!
//! ### Missing inputs
//! - `NoFix`: the decoder produced a sentence but the source has no fix yet
//! - `NoPulseSeen`: no pulse edge has been observed since boot, so there is
//!   no edge to pair a timestamp with
//!
//! ### Ambiguous pairing
//! - `TimestampTooOld`: the declared age reaches back to or before the last
//!   pulse; anchoring would pick the wrong second
//! - `TooCloseToNextPulse`: the next edge is imminent; jitter could cost a
//!   whole tick

use thiserror_no_std::Error;

/// Why a candidate timestamp was not used to anchor the clock.
///
/// Every rejection is recoverable: the control loop simply waits for the
/// next decoded sentence and tries again.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The decoder has not yet produced a usable timestamp.
    #[error("no fix from time source")]
    NoFix,

    /// No pulse edge has been observed yet, so the candidate cannot be
    /// paired with one.
    #[error("no pulse edge observed yet")]
    NoPulseSeen,

    /// The timestamp's declared age is comparable to or larger than the
    /// time since the last pulse; it may describe a moment at or before
    /// that edge.
    #[error("timestamp age {age_ms} ms reaches back to the last pulse ({pulse_age_us} us ago)")]
    TimestampTooOld {
        /// Declared age of the candidate at decode time, in milliseconds.
        age_ms: u32,
        /// Time since the last observed pulse edge, in microseconds.
        pulse_age_us: u32,
    },

    /// The next pulse is expected too soon for the pairing to survive
    /// jitter.
    #[error("timestamp {pulse_age_us} us after last pulse is too close to the next one")]
    TooCloseToNextPulse {
        /// Time since the last observed pulse edge, in microseconds.
        pulse_age_us: u32,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for RejectReason {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NoFix => defmt::write!(fmt, "no fix from time source"),
            Self::NoPulseSeen => defmt::write!(fmt, "no pulse edge observed yet"),
            Self::TimestampTooOld { age_ms, pulse_age_us } => {
                defmt::write!(fmt, "age {} ms reaches back to pulse {} us ago", age_ms, pulse_age_us)
            }
            Self::TooCloseToNextPulse { pulse_age_us } => {
                defmt::write!(fmt, "{} us after pulse is too close to the next", pulse_age_us)
            }
        }
    }
}
