//! Telemetry ring and logging helpers.
//!
//! Every event the glow controller emits is kept in the shared telemetry ring
//! and mirrored to defmt over RTT (stdout on host builds) so a probe shows the
//! cycle as it happens.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use glow_core::clock::{Millis, TickTimerConfig};
use glow_core::config::GlowConfig;
use glow_core::machine::GlowReport;
use glow_core::telemetry::{EventSink, GlowEventKind, TelemetryRecorder};

/// Event sink that records into the ring and logs each event.
pub struct EventLog {
    recorder: TelemetryRecorder,
}

impl EventLog {
    pub const fn new() -> Self {
        Self {
            recorder: TelemetryRecorder::new(),
        }
    }

    pub fn recorder(&self) -> &TelemetryRecorder {
        &self.recorder
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, timestamp: Millis, event: GlowEventKind) {
        let id = self.recorder.record(event, timestamp);
        emit_log(id, timestamp, event);
    }
}

#[cfg(target_os = "none")]
fn emit_log(id: u32, timestamp: Millis, event: GlowEventKind) {
    match event {
        GlowEventKind::HeartbeatToggled(_) => {
            defmt::trace!("telemetry:glow #{} t={}ms {}", id, timestamp, event);
        }
        _ => defmt::info!("telemetry:glow #{} t={}ms {}", id, timestamp, event),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(id: u32, timestamp: Millis, event: GlowEventKind) {
    println!("telemetry:glow #{id} t={timestamp}ms {event}");
}

/// Logs the settings the cycle runs with.
#[cfg(target_os = "none")]
pub fn log_config(config: &GlowConfig, timer: &TickTimerConfig) {
    defmt::info!(
        "glow: policy={} samples={} margin={}ms heartbeat={}ms systick_reload={}",
        config.policy,
        config.sampler.sample_count,
        config.safety_margin_ms,
        config.heartbeat_period_ms,
        timer.compare
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_config(config: &GlowConfig, timer: &TickTimerConfig) {
    println!(
        "glow: policy={} samples={} margin={}ms heartbeat={}ms systick_reload={}",
        config.policy,
        config.sampler.sample_count,
        config.safety_margin_ms,
        config.heartbeat_period_ms,
        timer.compare
    );
}

/// Logs the summary of a finished cycle.
#[cfg(target_os = "none")]
pub fn log_report(report: &GlowReport) {
    defmt::info!(
        "glow: reading={} duration={}ms deadline={}ms exit={} at={}ms toggles={}",
        report.plan.reading.value(),
        report.plan.glow_duration_ms,
        report.plan.safety_deadline_ms,
        report.exit,
        report.exited_at,
        report.heartbeat_toggles
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_report(report: &GlowReport) {
    println!(
        "glow: reading={} duration={}ms deadline={}ms exit={} at={}ms toggles={}",
        report.plan.reading.value(),
        report.plan.glow_duration_ms,
        report.plan.safety_deadline_ms,
        report.exit,
        report.exited_at,
        report.heartbeat_toggles
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use glow_core::machine::ExitReason;

    #[test]
    fn events_are_recorded_in_order() {
        let mut log = EventLog::new();
        log.emit(110, GlowEventKind::SampleAveraged(90));
        log.emit(110, GlowEventKind::GlowAsserted);
        log.emit(2_000, GlowEventKind::Halted(ExitReason::Cranked));

        let recorder = log.recorder();
        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.first_time_of(GlowEventKind::GlowAsserted), Some(110));

        let latest = recorder.latest().copied().expect("latest record");
        assert_eq!(latest.id, 2);
        assert_eq!(latest.event, GlowEventKind::Halted(ExitReason::Cranked));
    }
}
