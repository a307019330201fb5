//! Virtual-clock integration tests: the per-terminal software dividers
//! against a simulated 1024 Hz hardware tick.

use trios_kernel::clock::{validate_frequency, VirtualClock};

/// Drive `ticks` hardware ticks, consuming edges the way a reader keeping
/// up with the programmed rate would.
fn run_ticks(clock: &VirtualClock, ticks: u32) -> u32 {
    let mut edges = 0;
    for _ in 0..ticks {
        clock.hw_tick();
        if clock.take_edge() {
            edges += 1;
        }
    }
    edges
}

#[test]
fn one_second_at_sixteen_hertz() {
    // Scenario: open, write 16 Hz, read 16 times == one second of ticks.
    let clock = VirtualClock::new();
    clock.open();
    clock.set_frequency(16).unwrap();
    assert_eq!(run_ticks(&clock, 1024), 16);
}

#[test]
fn default_rate_is_two_hertz() {
    let clock = VirtualClock::new();
    clock.open();
    assert_eq!(run_ticks(&clock, 1024), 2);
}

#[test]
fn each_power_of_two_rate_delivers_exactly() {
    let mut freq = 2u32;
    while freq <= 1024 {
        let clock = VirtualClock::new();
        clock.open();
        clock.set_frequency(freq).unwrap();
        assert_eq!(run_ticks(&clock, 1024), freq, "freq {}", freq);
        freq *= 2;
    }
}

#[test]
fn rate_change_mid_stream() {
    let clock = VirtualClock::new();
    clock.open();
    clock.set_frequency(4).unwrap();
    assert_eq!(run_ticks(&clock, 512), 2);
    clock.set_frequency(256).unwrap();
    assert_eq!(run_ticks(&clock, 512), 128);
}

#[test]
fn invalid_write_is_rejected_and_rate_unchanged() {
    let clock = VirtualClock::new();
    clock.open();
    clock.set_frequency(64).unwrap();

    // Scenario: write {0x03} -> rejected, frequency unchanged.
    assert!(clock.set_frequency(3).is_err());
    assert_eq!(clock.frequency(), 64);
    assert_eq!(run_ticks(&clock, 1024), 64);
}

#[test]
fn slow_consumer_collapses_edges() {
    // A reader that oversleeps sees at most one pending edge.
    let clock = VirtualClock::new();
    clock.open();
    clock.set_frequency(1024).unwrap();
    for _ in 0..100 {
        clock.hw_tick();
    }
    assert!(clock.take_edge());
    assert!(!clock.take_edge());
}

#[test]
fn validation_accepts_only_powers_of_two_up_to_1024() {
    assert_eq!(validate_frequency(2), Some(2));
    assert_eq!(validate_frequency(1024), Some(1024));
    for bad in [0, 1, 3, 12, 100, 1023, 2048] {
        assert_eq!(validate_frequency(bad), None);
    }
}
