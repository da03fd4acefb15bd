//! Hardware Capability Traits and the Decoder Contract
//!
//! ## Overview
//!
//! The core never touches hardware directly. Everything it needs from the
//! platform is expressed as a narrow capability trait, implemented by the
//! host firmware over its HAL:
//!
//! - [`MonotonicClock`]: a free-running microsecond counter that wraps
//! - [`SerialSource`]: non-blocking bytes from the reference receiver
//! - [`SyncIndicator`]: one boolean output reflecting lock state
//! - [`TimestampDecoder`]: the external sentence decoder, consumed only
//!   through its output tuple
//!
//! ## Non-Blocking Model
//!
//! Serial input uses `nb::Result` in the pull-based style: the control
//! loop polls, `WouldBlock` means "nothing buffered right now", and no
//! call ever blocks. This keeps the loop's worst-case latency equal to
//! its drain window and nothing more.
//!
//! ## Test Doubles
//!
//! Each trait ships with a simple scripted implementation (`MockClock`,
//! `ScriptedSerial`, `MockIndicator`, `ScriptedDecoder`). They are not
//! test-gated: hosts use them for bring-up on a bench before the real
//! peripherals exist.

use core::cell::Cell;
use core::convert::Infallible;

use heapless::Deque;

use crate::clock::WallClock;
use crate::constants::INVALID_AGE_MS;

/// A decoded-but-unverified timestamp from the reference source.
///
/// Produced fresh on each decode attempt and discarded whether accepted
/// or rejected; it is never buffered. Field ranges are the decoder's
/// responsibility - format correctness of the source is outside this
/// subsystem's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Candidate {
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Minute of hour, 0-59.
    pub minute: u8,
    /// Second of minute, 0-59.
    pub second: u8,
    /// How long before decode completion this timestamp was valid at the
    /// source, in milliseconds. [`INVALID_AGE_MS`] means no fix.
    pub age_ms: u32,
}

impl Candidate {
    /// Whether the source had a fix when this candidate was produced.
    pub const fn has_fix(&self) -> bool {
        self.age_ms != INVALID_AGE_MS
    }

    /// The wall-clock fields of this candidate.
    pub const fn wall_clock(&self) -> WallClock {
        WallClock {
            hour: self.hour,
            minute: self.minute,
            second: self.second,
        }
    }
}

/// Free-running monotonic microsecond counter.
///
/// The counter wraps around at `u32::MAX`; all age computations in the
/// crate use wraparound-safe `wrapping_sub` and stay correct across the
/// rollover (roughly every 71 minutes).
pub trait MonotonicClock {
    /// Current counter value in microseconds.
    fn now_us(&self) -> u32;
}

impl<C: MonotonicClock> MonotonicClock for &C {
    fn now_us(&self) -> u32 {
        C::now_us(self)
    }
}

/// Non-blocking byte source for the reference receiver's serial line.
pub trait SerialSource {
    /// Pull one byte if any is buffered.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` when nothing is available;
    /// must never block.
    fn read(&mut self) -> nb::Result<u8, Infallible>;
}

/// One boolean-settable output reflecting lock state (on = synced).
///
/// Driven exclusively by the sync-status transition function so the
/// physical indicator can never disagree with the logical flag. Hosts
/// should hand it over in the "off" state.
pub trait SyncIndicator {
    /// Drive the indicator.
    fn set_locked(&mut self, locked: bool);
}

/// The external sentence decoder, seen only through its output.
///
/// Parsing the sentence format is out of scope here; the core feeds raw
/// bytes in and consumes `(h, m, s, age)` tuples out.
pub trait TimestampDecoder {
    /// Feed one raw serial byte into the decoder.
    fn feed(&mut self, byte: u8);

    /// Most recent complete timestamp, if any sentence has been decoded.
    ///
    /// `None` means no complete sentence yet. A candidate with
    /// `age_ms == INVALID_AGE_MS` means a sentence arrived but the source
    /// has no fix; validation short-circuits on it.
    fn timestamp(&self) -> Option<Candidate>;
}

// ===== Test doubles =====

/// Scripted monotonic clock for tests and bench bring-up.
///
/// Interior mutability lets a test hold `&MockClock` inside a controller
/// (via the blanket `&C` impl) while still advancing time from outside.
/// An optional auto-step advances the counter on every read, which is how
/// tests bound the busy-poll drain window.
#[derive(Debug, Default)]
pub struct MockClock {
    now: Cell<u32>,
    step: Cell<u32>,
}

impl MockClock {
    /// Clock starting at `now_us`, not advancing on its own.
    pub const fn new(now_us: u32) -> Self {
        Self {
            now: Cell::new(now_us),
            step: Cell::new(0),
        }
    }

    /// Advance the counter by `step_us` on every `now_us()` call.
    pub fn with_step(self, step_us: u32) -> Self {
        self.step.set(step_us);
        self
    }

    /// Jump to an absolute counter value.
    pub fn set(&self, now_us: u32) {
        self.now.set(now_us);
    }

    /// Advance the counter, wrapping like the hardware would.
    pub fn advance(&self, delta_us: u32) {
        self.now.set(self.now.get().wrapping_add(delta_us));
    }
}

impl MonotonicClock for MockClock {
    fn now_us(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step.get()));
        now
    }
}

/// Serial source that replays a preloaded byte script.
#[derive(Debug, Default)]
pub struct ScriptedSerial {
    buffer: Deque<u8, 256>,
}

impl ScriptedSerial {
    /// Empty source; every read reports `WouldBlock`.
    pub const fn new() -> Self {
        Self { buffer: Deque::new() }
    }

    /// Append bytes to the script. Bytes beyond the fixed capacity are
    /// silently dropped, mirroring a receiver FIFO overflowing.
    pub fn load(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.buffer.push_back(b).is_err() {
                break;
            }
        }
    }
}

impl SerialSource for ScriptedSerial {
    fn read(&mut self) -> nb::Result<u8, Infallible> {
        self.buffer.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

/// Indicator that records into caller-owned cells.
///
/// The real indicator is owned by the shared clock state, so tests
/// observe it through shared `Cell`s instead of keeping a handle.
#[derive(Debug)]
pub struct MockIndicator<'a> {
    locked: &'a Cell<bool>,
    writes: &'a Cell<u32>,
}

impl<'a> MockIndicator<'a> {
    /// Indicator writing its state into `locked` and counting writes.
    pub const fn new(locked: &'a Cell<bool>, writes: &'a Cell<u32>) -> Self {
        Self { locked, writes }
    }
}

impl SyncIndicator for MockIndicator<'_> {
    fn set_locked(&mut self, locked: bool) {
        self.locked.set(locked);
        self.writes.set(self.writes.get() + 1);
    }
}

/// Indicator that goes nowhere, for hosts without a lock LED.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIndicator;

impl SyncIndicator for NullIndicator {
    fn set_locked(&mut self, _locked: bool) {}
}

/// Decoder double that returns a preset candidate.
///
/// Ignores the byte content but counts what it was fed, so tests can
/// assert the drain window actually moved data.
#[derive(Debug, Default)]
pub struct ScriptedDecoder {
    candidate: Option<Candidate>,
    bytes_fed: usize,
}

impl ScriptedDecoder {
    /// Decoder with no sentence decoded yet.
    pub const fn new() -> Self {
        Self { candidate: None, bytes_fed: 0 }
    }

    /// Set what `timestamp()` returns from now on.
    pub fn set_timestamp(&mut self, candidate: Option<Candidate>) {
        self.candidate = candidate;
    }

    /// Total bytes fed since construction.
    pub fn bytes_fed(&self) -> usize {
        self.bytes_fed
    }
}

impl TimestampDecoder for ScriptedDecoder {
    fn feed(&mut self, _byte: u8) {
        self.bytes_fed += 1;
    }

    fn timestamp(&self) -> Option<Candidate> {
        self.candidate
    }
}
