//! Wall-Clock Time Without a Date
//!
//! ## Overview
//!
//! The subsystem tracks hour:minute:second only. There is no calendar: the
//! host instrument cares about pairing measurements with pulse-accurate
//! times of day, not about which day it is. Date rollover is deliberately
//! not tracked, which also means two readings exactly 24 h apart compare
//! equal - acceptable for the intended duty cycles.
//!
//! ## Mutation Discipline
//!
//! A `WallClock` inside the shared state is changed by exactly two
//! operations:
//! - `tick()`, called once per confirmed pulse from the interrupt path,
//!   advancing by one second with carry
//! - wholesale overwrite when a validated candidate anchors the clock
//!
//! Both run under the crate's masked-access discipline; this type itself
//! is plain data with no interior synchronization.

use core::fmt;

/// Wall time of day with one-second resolution.
///
/// Fields are kept in range by construction (`new`) and by `tick()`; the
/// struct is `Copy` so snapshots taken out of the shared state are cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WallClock {
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Minute of hour, 0-59.
    pub minute: u8,
    /// Second of minute, 0-59.
    pub second: u8,
}

impl WallClock {
    /// Midnight, the state of the clock before the first anchor.
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0, second: 0 };

    /// Create a clock value, rejecting out-of-range fields.
    pub const fn new(hour: u8, minute: u8, second: u8) -> Option<Self> {
        if hour < 24 && minute < 60 && second < 60 {
            Some(Self { hour, minute, second })
        } else {
            None
        }
    }

    /// Advance by exactly one second with carry propagation.
    ///
    /// Each field wraps modulo its range, so `23:59:59` ticks to
    /// `00:00:00`.
    pub fn tick(&mut self) {
        self.second = (self.second + 1) % 60;
        if self.second == 0 {
            self.minute = (self.minute + 1) % 60;
            if self.minute == 0 {
                self.hour = (self.hour + 1) % 24;
            }
        }
    }

    /// Seconds elapsed since midnight, 0-86399.
    pub const fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}
