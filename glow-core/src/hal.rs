//! Narrow hardware surface the preheat logic depends on.
//!
//! Firmware implements these traits on real peripherals; the emulator and the
//! tests implement them with the fakes in [`crate::sim`].

use crate::clock::TickTimerConfig;
use crate::config::AdcConfig;
use crate::crank::EdgePolarity;

/// Single-channel analog front end.
pub trait AnalogInput {
    /// Applies the converter settings before the first conversion.
    ///
    /// Drivers whose conversion clock is fixed by the platform ignore
    /// `prescaler`. A `channel` the driver is not wired to is a fatal error.
    fn configure_adc(&mut self, config: &AdcConfig);

    /// Kicks off one single-shot conversion.
    fn start_conversion(&mut self);

    /// Returns `true` once the conversion started last has finished.
    fn conversion_done(&mut self) -> bool;

    /// Returns the left-aligned 8-bit result of the last conversion.
    fn read_result(&mut self) -> u8;

    /// Runs one conversion and busy-waits for it.
    ///
    /// There is no timeout: a converter that never finishes hangs the caller.
    fn convert_blocking(&mut self) -> u8 {
        self.start_conversion();
        while !self.conversion_done() {
            core::hint::spin_loop();
        }
        self.read_result()
    }
}

/// Fixed-duration blocking delay.
pub trait DelayMs {
    /// Blocks for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Logical outputs driven by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputLine {
    /// Glow-plug relay drive.
    Glow,
    /// Diagnostic heartbeat LED.
    Heartbeat,
}

/// Abstraction over the physical output pins.
pub trait GlowOutputs {
    /// Drives `line` active (`true`) or inactive (`false`).
    fn apply(&mut self, line: OutputLine, active: bool);

    /// Returns every driven output to its inactive level.
    fn release_all(&mut self);
}

/// One-time interrupt source setup performed before sampling starts.
pub trait InterruptSetup {
    /// Starts the periodic timer that feeds the millisecond clock.
    fn configure_timer(&mut self, config: &TickTimerConfig);

    /// Arms the crank input interrupt on the given edge. Never disabled again.
    fn configure_edge_interrupt(&mut self, polarity: EdgePolarity);
}

/// Terminal low-power state.
pub trait LowPowerHalt {
    /// Enters the halt mode. Only an external power cycle leaves it.
    fn enter_low_power_halt(&mut self) -> !;
}
