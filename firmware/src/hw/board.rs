//! Output pins, delay, interrupt setup and the terminal halt.

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use embassy_executor::Spawner;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output};
use embassy_time::{Duration, block_for};
use glow_core::clock::TickTimerConfig;
use glow_core::crank::EdgePolarity;
use glow_core::hal::{DelayMs, GlowOutputs, InterruptSetup, LowPowerHalt, OutputLine};

use crate::runtime::crank_task;

/// Glow relay and heartbeat LED, both active high.
pub struct BoardOutputs<'d> {
    glow: Output<'d>,
    heartbeat: Output<'d>,
}

impl<'d> BoardOutputs<'d> {
    pub fn new(glow: Output<'d>, heartbeat: Output<'d>) -> Self {
        Self { glow, heartbeat }
    }

    fn output_mut(&mut self, line: OutputLine) -> &mut Output<'d> {
        match line {
            OutputLine::Glow => &mut self.glow,
            OutputLine::Heartbeat => &mut self.heartbeat,
        }
    }
}

impl GlowOutputs for BoardOutputs<'_> {
    fn apply(&mut self, line: OutputLine, active: bool) {
        self.output_mut(line).set_level(Level::from(active));
    }

    fn release_all(&mut self) {
        self.glow.set_low();
        self.heartbeat.set_low();
    }
}

/// Busy-wait delay on the Embassy time driver.
pub struct BlockingDelay;

impl DelayMs for BlockingDelay {
    fn delay_ms(&mut self, ms: u32) {
        block_for(Duration::from_millis(u64::from(ms)));
    }
}

/// SysTick millisecond source plus the EXTI crank watcher.
pub struct BoardInterrupts {
    syst: SYST,
    spawner: Spawner,
    crank: Option<ExtiInput<'static>>,
}

impl BoardInterrupts {
    pub fn new(syst: SYST, spawner: Spawner, crank: ExtiInput<'static>) -> Self {
        Self {
            syst,
            spawner,
            crank: Some(crank),
        }
    }

    pub fn into_syst(self) -> SYST {
        self.syst
    }
}

impl InterruptSetup for BoardInterrupts {
    fn configure_timer(&mut self, config: &TickTimerConfig) {
        // SysTick has no prescaler; the core clock drives the reload counter.
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.set_reload(config.compare);
        self.syst.clear_current();
        self.syst.enable_interrupt();
        self.syst.enable_counter();
    }

    fn configure_edge_interrupt(&mut self, polarity: EdgePolarity) {
        let Some(crank) = self.crank.take() else {
            defmt::warn!("crank watcher already running");
            return;
        };
        self.spawner
            .spawn(crank_task::run(crank, polarity))
            .expect("failed to spawn crank task");
    }
}

/// Deep-sleep halt with every interrupt masked. Only a power cycle resumes.
pub struct DeepSleepHalt {
    scb: SCB,
    syst: SYST,
}

impl DeepSleepHalt {
    pub fn new(scb: SCB, syst: SYST) -> Self {
        Self { scb, syst }
    }
}

impl LowPowerHalt for DeepSleepHalt {
    fn enter_low_power_halt(&mut self) -> ! {
        cortex_m::interrupt::disable();
        self.syst.disable_interrupt();
        self.syst.disable_counter();
        self.scb.set_sleepdeep();
        loop {
            cortex_m::asm::wfi();
        }
    }
}
