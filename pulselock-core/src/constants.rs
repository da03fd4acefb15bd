//! Timing Constants for Pulse Discipline
//!
//! This module defines the timing figures that govern pulse acceptance,
//! staleness detection, and candidate validation. They are shared between
//! the interrupt path and the control loop, so both sides always agree on
//! what "on time" and "too old" mean.

// ===== PULSE CONTRACT =====

/// Nominal pulse period (microseconds).
///
/// The external reference emits one rising edge per second. Every age
/// computation in the crate is measured against this period.
pub const PULSE_PERIOD_US: u32 = 1_000_000;

/// Maximum tolerable gap between pulses (microseconds).
///
/// 1.5x the nominal period. A gap this long means at least one pulse was
/// skipped, so the local clock can no longer be trusted and the system
/// demotes itself to unsynced.
///
/// Source: reference receiver holdover behavior
pub const PULSE_TIMEOUT_US: u32 = 1_500_000;

// ===== CANDIDATE VALIDATION =====

/// Safety distance kept to pulse edges on both sides (microseconds).
///
/// A candidate timestamp is only paired with the next pulse when it
/// describes a moment at least this far after the previous edge and this
/// far before the expected next one. Covers serial latency jitter and the
/// decode time of one sentence.
pub const SAFETY_MARGIN_US: u32 = 5_000;

/// Sentinel age meaning the decoder has no fix.
///
/// Matches the convention of common sentence decoders, which report
/// `u32::MAX` as the timestamp age until the source has acquired a fix.
pub const INVALID_AGE_MS: u32 = u32::MAX;

// ===== CONTROL LOOP =====

/// Default serial drain window per control-loop pass (microseconds).
///
/// At 9600 baud a full timestamp sentence arrives in well under 100 ms,
/// so one window is enough for the decoder to make progress each pass
/// while keeping the loop responsive.
pub const DEFAULT_DRAIN_WINDOW_US: u32 = 100_000;

// ===== OBSERVABILITY =====

/// Depth of the bounded sync-event ring.
///
/// Sync transitions are rare (at most a few per acquisition attempt), so
/// a small ring is plenty. Oldest events are dropped on overflow and the
/// drop is counted.
pub const EVENT_RING_DEPTH: usize = 8;
