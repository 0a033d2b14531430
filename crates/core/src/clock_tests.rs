// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
    assert!(clock.epoch_ms() > 0);
}

#[test]
fn fake_clock_advance_moves_both_scales() {
    let clock = FakeClock::new();
    let start = clock.now();
    let start_ms = clock.epoch_ms();

    clock.advance(Duration::from_secs(30));

    assert_eq!(clock.now() - start, Duration::from_secs(30));
    assert_eq!(clock.epoch_ms() - start_ms, 30_000);
}

#[test]
fn fake_clock_set_overrides_both_scales() {
    let clock = FakeClock::new();
    let later = Instant::now() + Duration::from_secs(5);

    clock.set(later);
    clock.set_epoch_ms(1_700_000_000_000);

    assert_eq!(clock.now(), later);
    assert_eq!(clock.epoch_ms(), 1_700_000_000_000);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_millis(250));
    assert_eq!(other.epoch_ms(), clock.epoch_ms());
}
