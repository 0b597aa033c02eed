use std::panic::{self, AssertUnwindSafe};

use glow_core::config::{CancelPolicy, GlowConfig};
use glow_core::machine::{ExitReason, GlowController};
use glow_core::sampler::SensorReading;
use glow_core::sim::{LineLevels, LineMonitor, RecordingHalt};
use glow_core::telemetry::NoopSink;

const RELEASED: LineLevels = LineLevels {
    glow: false,
    heartbeat: false,
    release_calls: 1,
};

#[test]
fn shut_down_mid_glow_releases_both_lines_before_halting() {
    let lines = LineMonitor::new();
    let mut halt = RecordingHalt::new(&lines);
    let config = GlowConfig::DEFAULT.with_policy(CancelPolicy::SafetyMarginHold);
    let mut controller = GlowController::new(config, &lines);

    controller.begin_sampling().expect("idle -> sampling");
    let exit = controller
        .begin(SensorReading::new(90), 110, &mut NoopSink)
        .expect("sampling -> glowing");
    assert_eq!(exit, None);
    assert_eq!(controller.poll(610, false, &mut NoopSink), None);
    assert!(lines.glow());
    assert!(lines.heartbeat());

    let outcome: std::thread::Result<()> = panic::catch_unwind(AssertUnwindSafe(|| {
        controller.shut_down(&mut halt);
    }));

    assert!(outcome.is_err(), "halt never returns");
    assert_eq!(halt.entries(), 1);
    assert_eq!(halt.at_entry(), Some(RELEASED));
}

#[test]
fn shut_down_after_a_crank_enters_the_halt_once() {
    let lines = LineMonitor::new();
    let mut halt = RecordingHalt::new(&lines);
    let mut controller = GlowController::new(GlowConfig::DEFAULT, &lines);

    controller.begin_sampling().expect("idle -> sampling");
    controller
        .begin(SensorReading::new(90), 110, &mut NoopSink)
        .expect("sampling -> glowing");
    assert_eq!(
        controller.poll(1_000, true, &mut NoopSink),
        Some(ExitReason::Cranked)
    );
    assert_eq!(lines.release_calls(), 1);

    let outcome: std::thread::Result<()> = panic::catch_unwind(AssertUnwindSafe(|| {
        controller.shut_down(&mut halt);
    }));

    assert!(outcome.is_err(), "halt never returns");
    assert_eq!(halt.entries(), 1);
    let levels = halt.at_entry().expect("halt entered");
    assert!(!levels.glow);
    assert!(!levels.heartbeat);
    assert_eq!(levels.release_calls, 2);
}
