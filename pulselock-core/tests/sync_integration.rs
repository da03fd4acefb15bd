//! Integration tests for the sync subsystem
//!
//! Drives the shared clock state and the control loop together through
//! full acquire / tick / lose / re-acquire cycles using the scripted
//! hardware doubles, checking the behavior at the public API.

use core::cell::Cell;

use pulselock_core::{
    Candidate, MockClock, MockIndicator, NullIndicator, RejectReason, ScriptedDecoder,
    ScriptedSerial, SharedClock, SyncConfig, SyncController, SyncEvent, WallClock,
};

/// Zero-width drain window so tests control pulse ages exactly; the
/// default 5 ms safety margin stays in force.
fn tight_config() -> SyncConfig {
    SyncConfig { drain_window_us: 0, ..SyncConfig::default() }
}

fn candidate(hour: u8, minute: u8, second: u8, age_ms: u32) -> Candidate {
    Candidate { hour, minute, second, age_ms }
}

fn wall(hour: u8, minute: u8, second: u8) -> WallClock {
    WallClock::new(hour, minute, second).unwrap()
}

#[test]
fn candidate_midwindow_anchors_the_clock() {
    // unsynced, candidate 12:00:00 aged 200 ms, last pulse 800 ms ago
    // -> unambiguous pairing, accept
    let shared = SharedClock::new(NullIndicator);
    shared.on_pulse(1_000_000);

    let clock = MockClock::new(1_800_000);
    let mut decoder = ScriptedDecoder::new();
    decoder.set_timestamp(Some(candidate(12, 0, 0, 200)));

    let mut controller = SyncController::with_config(
        &shared,
        &clock,
        ScriptedSerial::new(),
        decoder,
        tight_config(),
    );

    controller.sync_to_reference();

    assert!(controller.is_synced());
    assert_eq!(controller.time(), wall(12, 0, 0));
    assert_eq!(
        shared.pop_event(),
        Some(SyncEvent::SyncAcquired { time: wall(12, 0, 0) }),
    );
    assert_eq!(shared.pop_event(), None);
}

#[test]
fn no_fix_candidate_never_anchors() {
    let shared = SharedClock::new(NullIndicator);
    shared.on_pulse(0);

    let clock = MockClock::new(500_000);
    let mut decoder = ScriptedDecoder::new();
    decoder.set_timestamp(Some(candidate(12, 0, 0, u32::MAX)));

    let mut controller = SyncController::with_config(
        &shared,
        &clock,
        ScriptedSerial::new(),
        decoder,
        tight_config(),
    );

    for _ in 0..3 {
        controller.sync_to_reference();
        assert!(!controller.is_synced());
    }
    assert_eq!(
        shared.pop_event(),
        Some(SyncEvent::CandidateRejected { reason: RejectReason::NoFix }),
    );
}

#[test]
fn candidate_without_any_pulse_is_rejected() {
    let shared = SharedClock::new(NullIndicator);

    let clock = MockClock::new(700_000);
    let mut decoder = ScriptedDecoder::new();
    decoder.set_timestamp(Some(candidate(9, 0, 0, 100)));

    let mut controller = SyncController::with_config(
        &shared,
        &clock,
        ScriptedSerial::new(),
        decoder,
        tight_config(),
    );

    controller.sync_to_reference();

    assert!(!controller.is_synced());
    assert_eq!(
        shared.pop_event(),
        Some(SyncEvent::CandidateRejected { reason: RejectReason::NoPulseSeen }),
    );
}

#[test]
fn full_acquire_tick_lose_reacquire_cycle() {
    let locked = Cell::new(false);
    let writes = Cell::new(0u32);
    let shared = SharedClock::new(MockIndicator::new(&locked, &writes));

    let clock = MockClock::new(0);
    let mut controller = SyncController::with_config(
        &shared,
        &clock,
        ScriptedSerial::new(),
        ScriptedDecoder::new(),
        tight_config(),
    );

    // Boot: no pulse, no sentence. Nothing happens.
    controller.sync_to_reference();
    assert!(!controller.is_synced());
    assert_eq!(shared.pop_event(), None);

    // First pulse arrives; a candidate shows up 996 ms after it, too
    // close to the next edge to pair safely.
    shared.on_pulse(1_000_000);
    clock.set(1_996_000);
    controller.decoder_mut().set_timestamp(Some(candidate(12, 0, 0, 150)));
    controller.sync_to_reference();
    assert!(!controller.is_synced());
    assert!(!locked.get());
    assert_eq!(
        shared.pop_event(),
        Some(SyncEvent::CandidateRejected {
            reason: RejectReason::TooCloseToNextPulse { pulse_age_us: 996_000 },
        }),
    );

    // Next pulse, fresh sentence mid-window: accepted.
    shared.on_pulse(2_000_000);
    clock.set(2_400_000);
    controller.decoder_mut().set_timestamp(Some(candidate(12, 0, 1, 150)));
    controller.sync_to_reference();
    assert!(controller.is_synced());
    assert!(locked.get());
    assert_eq!(controller.time(), wall(12, 0, 1));

    // Confirmed pulses advance the clock one second each.
    shared.on_pulse(3_000_000);
    assert_eq!(controller.time(), wall(12, 0, 2));
    shared.on_pulse(4_000_000);
    assert_eq!(controller.time(), wall(12, 0, 3));
    assert!(shared.time_equals(&wall(12, 0, 3)));

    // Pulses stop; the control loop notices before the next edge would.
    clock.set(5_700_000);
    controller.sync_to_reference();
    assert!(!controller.is_synced());
    assert!(!locked.get());
    // demotion froze the clock instead of advancing it
    assert_eq!(shared.time(), wall(12, 0, 3));

    // Pulses resume and a fresh candidate re-anchors.
    shared.on_pulse(6_000_000);
    clock.set(6_300_000);
    controller.decoder_mut().set_timestamp(Some(candidate(12, 0, 7, 100)));
    controller.sync_to_reference();
    assert!(controller.is_synced());
    assert!(locked.get());
    assert_eq!(controller.time(), wall(12, 0, 7));

    // Event trail tells the whole story in order.
    assert_eq!(
        shared.pop_event(),
        Some(SyncEvent::SyncAcquired { time: wall(12, 0, 1) }),
    );
    assert_eq!(
        shared.pop_event(),
        Some(SyncEvent::SyncLost { pulse_age_us: 1_700_000 }),
    );
    assert_eq!(
        shared.pop_event(),
        Some(SyncEvent::SyncAcquired { time: wall(12, 0, 7) }),
    );
    assert_eq!(shared.pop_event(), None);

    // Indicator was driven exactly once per logical transition.
    assert_eq!(writes.get(), 3);
}

#[test]
fn missed_pulse_detected_by_handler_demotes() {
    // synced at 10:30:59, next pulse 1.6 s late
    let shared = SharedClock::new(NullIndicator);
    shared.on_pulse(1_000_000);

    let clock = MockClock::new(1_500_000);
    let mut decoder = ScriptedDecoder::new();
    decoder.set_timestamp(Some(candidate(10, 30, 59, 100)));
    let mut controller = SyncController::with_config(
        &shared,
        &clock,
        ScriptedSerial::new(),
        decoder,
        tight_config(),
    );
    controller.sync_to_reference();
    assert!(controller.is_synced());

    shared.on_pulse(2_600_000);

    assert!(!controller.is_synced());
    assert_eq!(controller.time(), wall(10, 30, 59));
}

#[test]
fn midnight_rollover_through_the_public_api() {
    let shared = SharedClock::new(NullIndicator);
    shared.on_pulse(1_000_000);

    let clock = MockClock::new(1_300_000);
    let mut decoder = ScriptedDecoder::new();
    decoder.set_timestamp(Some(candidate(23, 59, 59, 50)));
    let mut controller = SyncController::with_config(
        &shared,
        &clock,
        ScriptedSerial::new(),
        decoder,
        tight_config(),
    );
    controller.sync_to_reference();
    assert_eq!(controller.time(), wall(23, 59, 59));

    shared.on_pulse(2_000_000);
    assert_eq!(controller.time(), WallClock::MIDNIGHT);
    assert_eq!(format!("{}", controller.time()), "00:00:00");
}

#[test]
fn drain_window_bounds_serial_polling() {
    let shared = SharedClock::new(NullIndicator);

    // Each now_us() read advances 10 ms; a 100 ms window allows ~10 polls.
    let clock = MockClock::new(0).with_step(10_000);
    let mut serial = ScriptedSerial::new();
    serial.load(b"$TIME,120001,150*");

    let config = SyncConfig { drain_window_us: 100_000, ..SyncConfig::default() };
    let mut controller =
        SyncController::with_config(&shared, &clock, serial, ScriptedDecoder::new(), config);

    // Unsynced pass: drains for one window and returns even though the
    // decoder never produces a sentence.
    controller.sync_to_reference();

    let fed = controller.decoder().bytes_fed();
    assert!(fed > 0, "drain must move buffered bytes into the decoder");
    assert!(fed <= 10, "drain must stop at the window, fed {fed}");
    assert!(!controller.is_synced());
}

#[test]
fn stale_pulse_age_across_counter_wraparound() {
    let shared = SharedClock::new(NullIndicator);
    shared.on_pulse(u32::MAX - 200_000);

    let clock = MockClock::new(400_000);
    let mut decoder = ScriptedDecoder::new();
    decoder.set_timestamp(Some(candidate(3, 0, 0, 100)));
    let mut controller = SyncController::with_config(
        &shared,
        &clock,
        ScriptedSerial::new(),
        decoder,
        tight_config(),
    );

    // Wrapped age is ~600 ms: valid anchor window despite the rollover.
    controller.sync_to_reference();
    assert!(controller.is_synced());
    assert_eq!(controller.time(), wall(3, 0, 0));
}
