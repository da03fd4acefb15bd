//! Pulse-disciplined wall clock for Pulselock
//!
//! Disciplines a local hour:minute:second clock to an external reference
//! that delivers a once-per-second hardware pulse plus periodic serial
//! timestamp sentences, so an MCU without an RTC knows wall time accurate
//! to the pulse edge.
//!
//! Key constraints:
//! - One interrupt context (the pulse edge) preempting one cooperative
//!   control loop, no true parallelism
//! - No heap allocation, no blocking calls
//! - Failure is state, not an exception: everything demotes to "unsynced"
//!   and re-acquisition retries forever
//!
//! ```no_run
//! use pulselock_core::{SharedClock, SyncController, NullIndicator};
//! # use pulselock_core::{MockClock, ScriptedSerial, ScriptedDecoder};
//!
//! static CLOCK: SharedClock<NullIndicator> = SharedClock::new(NullIndicator);
//!
//! // ISR, registered on the rising edge of the pulse line:
//! // CLOCK.on_pulse(timer.now_us());
//!
//! # let (timer, serial, decoder) = (MockClock::new(0), ScriptedSerial::new(), ScriptedDecoder::new());
//! let mut controller = SyncController::new(&CLOCK, timer, serial, decoder);
//! loop {
//!     controller.sync_to_reference();
//!     if controller.is_synced() {
//!         let now = controller.time();
//!         // pair measurements with `now`
//!     }
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod events;
pub mod state;
pub mod traits;

// Public API
pub use clock::WallClock;
pub use controller::{validate_candidate, SyncConfig, SyncController};
pub use errors::RejectReason;
pub use events::SyncEvent;
pub use state::SharedClock;
pub use traits::{
    Candidate, MockClock, MockIndicator, MonotonicClock, NullIndicator, ScriptedDecoder,
    ScriptedSerial, SerialSource, SyncIndicator, TimestampDecoder,
};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
