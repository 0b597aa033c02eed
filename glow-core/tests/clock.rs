use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use glow_core::clock::{Clock, MillisCounter, TickTimerConfig, TICK_HZ};
use glow_core::shared::IsrShared;

static SHARED: IsrShared = IsrShared::new();

#[test]
fn reads_stay_monotonic_while_the_tick_source_runs() {
    const TICKS: u32 = 20_000;
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..TICKS {
                SHARED.millis.tick();
            }
            done.store(true, Ordering::Release);
        });

        let mut previous = 0;
        while !done.load(Ordering::Acquire) {
            let now = SHARED.millis.now();
            assert!(now >= previous, "clock went backwards: {previous} -> {now}");
            previous = now;
        }
    });

    assert_eq!(SHARED.millis.now(), TICKS);
}

#[test]
fn counter_wraps_instead_of_saturating() {
    let counter = MillisCounter::new();
    counter.tick();
    let start = Clock::now(&counter);
    assert_eq!(counter.elapsed_since(start), 0);
    assert_eq!(counter.elapsed_since(u32::MAX), 2);
}

#[test]
fn sixteen_megahertz_timer_ticks_at_one_kilohertz() {
    let timer = TickTimerConfig::for_millis(16_000_000, 1, 0);
    assert_eq!(timer.tick_hz(16_000_000), TICK_HZ);
}
