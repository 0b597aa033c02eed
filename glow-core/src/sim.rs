//! Simulated peripherals driven by virtual time.
//!
//! Every fake here advances a shared [`MillisCounter`] the way the tick
//! interrupt would on hardware, so a whole preheat cycle runs in a few
//! microseconds on the host while keeping the millisecond arithmetic intact.

use core::cell::Cell;

use crate::clock::{Clock, Millis, MillisCounter, TickTimerConfig};
use crate::config::AdcConfig;
use crate::crank::{CrankLatch, CrankSense, EdgePolarity};
use crate::hal::{AnalogInput, DelayMs, GlowOutputs, InterruptSetup, LowPowerHalt, OutputLine};

/// Number of `conversion_done` polls that report busy before a result lands.
const CONVERSION_BUSY_POLLS: u8 = 1;

/// Converter returning a scripted sequence of samples, wrapping around to the
/// start once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedAdc<'a> {
    samples: &'a [u8],
    cursor: usize,
    busy_polls: u8,
    converting: bool,
    configured: Option<AdcConfig>,
    configure_calls: u32,
    conversions: u32,
}

impl<'a> ScriptedAdc<'a> {
    /// Creates a converter cycling through `samples`. An empty script reads 0.
    #[must_use]
    pub const fn new(samples: &'a [u8]) -> Self {
        Self {
            samples,
            cursor: 0,
            busy_polls: 0,
            converting: false,
            configured: None,
            configure_calls: 0,
            conversions: 0,
        }
    }

    /// Settings applied by the most recent `configure_adc` call.
    #[must_use]
    pub const fn configured(&self) -> Option<AdcConfig> {
        self.configured
    }

    #[must_use]
    pub const fn configure_calls(&self) -> u32 {
        self.configure_calls
    }

    /// Number of conversions whose result was read.
    #[must_use]
    pub const fn conversions(&self) -> u32 {
        self.conversions
    }
}

impl AnalogInput for ScriptedAdc<'_> {
    fn configure_adc(&mut self, config: &AdcConfig) {
        self.configured = Some(*config);
        self.configure_calls += 1;
    }

    fn start_conversion(&mut self) {
        self.converting = true;
        self.busy_polls = CONVERSION_BUSY_POLLS;
    }

    fn conversion_done(&mut self) -> bool {
        if !self.converting {
            return true;
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return false;
        }
        true
    }

    fn read_result(&mut self) -> u8 {
        self.converting = false;
        self.conversions += 1;
        if self.samples.is_empty() {
            return 0;
        }
        let sample = self.samples[self.cursor % self.samples.len()];
        self.cursor = self.cursor.wrapping_add(1);
        sample
    }
}

/// Delay that advances virtual time one tick per millisecond.
pub struct TickDelay<'a> {
    clock: &'a MillisCounter,
}

impl<'a> TickDelay<'a> {
    #[must_use]
    pub const fn new(clock: &'a MillisCounter) -> Self {
        Self { clock }
    }
}

impl DelayMs for TickDelay<'_> {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.clock.tick();
        }
    }
}

/// Clock whose every read is followed by one simulated tick, so a busy loop
/// observes time passing at one millisecond per iteration.
pub struct TickingClock<'a> {
    clock: &'a MillisCounter,
}

impl<'a> TickingClock<'a> {
    #[must_use]
    pub const fn new(clock: &'a MillisCounter) -> Self {
        Self { clock }
    }
}

impl Clock for TickingClock<'_> {
    fn now(&self) -> Millis {
        let now = self.clock.now();
        self.clock.tick();
        now
    }
}

/// Crank input that fires its edge once virtual time reaches `crank_at`.
pub struct ScriptedCrank<'a> {
    clock: &'a MillisCounter,
    latch: &'a CrankLatch,
    crank_at: Option<Millis>,
}

impl<'a> ScriptedCrank<'a> {
    /// `crank_at: None` never cranks.
    #[must_use]
    pub const fn new(
        clock: &'a MillisCounter,
        latch: &'a CrankLatch,
        crank_at: Option<Millis>,
    ) -> Self {
        Self {
            clock,
            latch,
            crank_at,
        }
    }
}

impl CrankSense for ScriptedCrank<'_> {
    fn is_cranked(&self) -> bool {
        if let Some(at) = self.crank_at {
            if self.clock.now() >= at {
                self.latch.on_crank_edge();
            }
        }
        self.latch.is_cranked()
    }
}

/// Output driver that remembers the level of each line.
#[derive(Debug, Default)]
pub struct RecordingOutputs {
    glow: bool,
    heartbeat: bool,
    glow_assertions: u32,
    heartbeat_edges: u32,
    release_calls: u32,
}

impl RecordingOutputs {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            glow: false,
            heartbeat: false,
            glow_assertions: 0,
            heartbeat_edges: 0,
            release_calls: 0,
        }
    }

    #[must_use]
    pub const fn glow(&self) -> bool {
        self.glow
    }

    #[must_use]
    pub const fn heartbeat(&self) -> bool {
        self.heartbeat
    }

    /// Number of inactive-to-active transitions on the glow line.
    #[must_use]
    pub const fn glow_assertions(&self) -> u32 {
        self.glow_assertions
    }

    /// Number of level changes on the heartbeat line.
    #[must_use]
    pub const fn heartbeat_edges(&self) -> u32 {
        self.heartbeat_edges
    }

    /// Returns `true` once `release_all` ran and every line is inactive.
    #[must_use]
    pub const fn released(&self) -> bool {
        self.release_calls > 0 && !self.glow && !self.heartbeat
    }
}

impl GlowOutputs for RecordingOutputs {
    fn apply(&mut self, line: OutputLine, active: bool) {
        match line {
            OutputLine::Glow => {
                if active && !self.glow {
                    self.glow_assertions += 1;
                }
                self.glow = active;
            }
            OutputLine::Heartbeat => {
                if active != self.heartbeat {
                    self.heartbeat_edges += 1;
                }
                self.heartbeat = active;
            }
        }
    }

    fn release_all(&mut self) {
        self.glow = false;
        self.heartbeat = false;
        self.release_calls += 1;
    }
}

/// Output levels kept in `Cell`s so the driver can be handed to a controller
/// while something else still observes the lines.
#[derive(Debug, Default)]
pub struct LineMonitor {
    glow: Cell<bool>,
    heartbeat: Cell<bool>,
    release_calls: Cell<u32>,
}

impl LineMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            glow: Cell::new(false),
            heartbeat: Cell::new(false),
            release_calls: Cell::new(0),
        }
    }

    #[must_use]
    pub fn glow(&self) -> bool {
        self.glow.get()
    }

    #[must_use]
    pub fn heartbeat(&self) -> bool {
        self.heartbeat.get()
    }

    #[must_use]
    pub fn release_calls(&self) -> u32 {
        self.release_calls.get()
    }

    fn levels(&self) -> LineLevels {
        LineLevels {
            glow: self.glow.get(),
            heartbeat: self.heartbeat.get(),
            release_calls: self.release_calls.get(),
        }
    }
}

impl GlowOutputs for &LineMonitor {
    fn apply(&mut self, line: OutputLine, active: bool) {
        match line {
            OutputLine::Glow => self.glow.set(active),
            OutputLine::Heartbeat => self.heartbeat.set(active),
        }
    }

    fn release_all(&mut self) {
        self.glow.set(false);
        self.heartbeat.set(false);
        self.release_calls.set(self.release_calls.get() + 1);
    }
}

/// Line state captured by [`RecordingHalt`] when the halt was entered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineLevels {
    pub glow: bool,
    pub heartbeat: bool,
    pub release_calls: u32,
}

/// Halt that snapshots the watched lines and then panics, since a host test
/// cannot sleep until the next power cycle.
#[derive(Debug)]
pub struct RecordingHalt<'a> {
    lines: &'a LineMonitor,
    entries: u32,
    at_entry: Option<LineLevels>,
}

impl<'a> RecordingHalt<'a> {
    #[must_use]
    pub const fn new(lines: &'a LineMonitor) -> Self {
        Self {
            lines,
            entries: 0,
            at_entry: None,
        }
    }

    /// Number of times the halt was entered.
    #[must_use]
    pub const fn entries(&self) -> u32 {
        self.entries
    }

    /// Line state seen on the most recent entry.
    #[must_use]
    pub const fn at_entry(&self) -> Option<LineLevels> {
        self.at_entry
    }
}

impl LowPowerHalt for RecordingHalt<'_> {
    fn enter_low_power_halt(&mut self) -> ! {
        self.entries += 1;
        self.at_entry = Some(self.lines.levels());
        panic!("entered low-power halt");
    }
}

/// Interrupt setup that records what was requested.
#[derive(Copy, Clone, Debug, Default)]
pub struct RecordingInterrupts {
    timer: Option<TickTimerConfig>,
    edge: Option<EdgePolarity>,
}

impl RecordingInterrupts {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timer: None,
            edge: None,
        }
    }

    #[must_use]
    pub const fn timer(&self) -> Option<TickTimerConfig> {
        self.timer
    }

    #[must_use]
    pub const fn edge(&self) -> Option<EdgePolarity> {
        self.edge
    }
}

impl InterruptSetup for RecordingInterrupts {
    fn configure_timer(&mut self, config: &TickTimerConfig) {
        self.timer = Some(*config);
    }

    fn configure_edge_interrupt(&mut self, polarity: EdgePolarity) {
        self.edge = Some(polarity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlowConfig;
    use crate::machine::configure_interrupts;

    #[test]
    fn scripted_adc_reports_busy_before_done() {
        let mut adc = ScriptedAdc::new(&[7, 9]);
        adc.start_conversion();
        assert!(!adc.conversion_done());
        assert!(adc.conversion_done());
        assert_eq!(adc.read_result(), 7);
        assert_eq!(adc.convert_blocking(), 9);
        assert_eq!(adc.convert_blocking(), 7);
        assert_eq!(adc.conversions(), 3);
    }

    #[test]
    fn scripted_crank_latches_at_the_scheduled_time() {
        let clock = MillisCounter::new();
        let latch = CrankLatch::new();
        let crank = ScriptedCrank::new(&clock, &latch, Some(3));
        let ticking = TickingClock::new(&clock);

        assert_eq!(ticking.now(), 0);
        assert!(!crank.is_cranked());
        ticking.now();
        ticking.now();
        assert!(crank.is_cranked());
        assert!(latch.is_cranked());
    }

    #[test]
    fn line_monitor_tracks_levels_through_a_shared_borrow() {
        let lines = LineMonitor::new();
        let mut driver = &lines;
        driver.apply(OutputLine::Glow, true);
        driver.apply(OutputLine::Heartbeat, true);
        assert!(lines.glow() && lines.heartbeat());

        driver.release_all();
        assert!(!lines.glow() && !lines.heartbeat());
        assert_eq!(lines.release_calls(), 1);
    }

    #[test]
    fn recording_interrupts_capture_setup() {
        let mut irq = RecordingInterrupts::new();
        let timer = TickTimerConfig::for_millis(16_000_000, 1, 0);
        let config = GlowConfig::DEFAULT.with_crank_polarity(EdgePolarity::Falling);
        configure_interrupts(&mut irq, &timer, &config);
        assert_eq!(irq.timer(), Some(timer));
        assert_eq!(irq.edge(), Some(EdgePolarity::Falling));
    }
}
