//! Software millisecond clock fed by a periodic timer interrupt.
//!
//! The counter is wider than a single bus access on small cores, so every read
//! happens inside a critical section. On the firmware that masks interrupts and
//! restores the previous mask afterwards; on the host `critical-section`
//! provides a process-wide lock instead.

use core::cell::Cell;

use critical_section::Mutex;

/// Milliseconds elapsed since power-up.
pub type Millis = u32;

/// Monotonic millisecond source polled by the glow loop.
pub trait Clock {
    /// Returns the milliseconds elapsed since power-up.
    fn now(&self) -> Millis;
}

impl<C> Clock for &C
where
    C: Clock + ?Sized,
{
    fn now(&self) -> Millis {
        (**self).now()
    }
}

/// Free-running tick counter shared between the timer ISR and the main loop.
///
/// The timer interrupt is the only writer (through [`MillisCounter::tick`]);
/// the main loop is the only reader.
pub struct MillisCounter {
    ticks: Mutex<Cell<Millis>>,
}

impl MillisCounter {
    /// Creates a counter that starts at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
        }
    }

    /// Advances the counter by one tick. Call from the timer interrupt only.
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().wrapping_add(1));
        });
    }

    /// Reads the counter with the timer interrupt masked.
    #[must_use]
    pub fn now(&self) -> Millis {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    /// Milliseconds elapsed since `earlier`, tolerant of counter wraparound.
    #[must_use]
    pub fn elapsed_since(&self, earlier: Millis) -> Millis {
        self.now().wrapping_sub(earlier)
    }
}

impl Default for MillisCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MillisCounter {
    fn now(&self) -> Millis {
        MillisCounter::now(self)
    }
}

/// Nominal tick rate of the millisecond clock.
pub const TICK_HZ: u32 = 1_000;

/// Compare/reload settings that make a hardware timer fire once per millisecond.
///
/// Internal oscillators run off-nominal, so the computed compare value can be
/// nudged by a signed `trim` until the heartbeat output blinks at the intended
/// rate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickTimerConfig {
    /// Timer input clock divider.
    pub prescaler: u32,
    /// Counter value at which the timer matches and restarts.
    pub compare: u32,
}

impl TickTimerConfig {
    /// Builds a 1 kHz configuration for a timer fed by `timer_clock_hz`.
    ///
    /// The timer counts `compare + 1` prescaled cycles per tick, so the untrimmed
    /// compare value is `timer_clock_hz / prescaler / 1000 - 1`.
    #[must_use]
    pub const fn for_millis(timer_clock_hz: u32, prescaler: u32, trim: i32) -> Self {
        let prescaler = if prescaler == 0 { 1 } else { prescaler };
        let cycles = (timer_clock_hz / prescaler / TICK_HZ) as i64;
        let compare = cycles - 1 + trim as i64;
        let compare = if compare < 0 {
            0
        } else if compare > u32::MAX as i64 {
            u32::MAX
        } else {
            compare as u32
        };

        Self { prescaler, compare }
    }

    /// Tick rate produced by this configuration when the timer clock is exact.
    #[must_use]
    pub const fn tick_hz(&self, timer_clock_hz: u32) -> u32 {
        let divisor = self.prescaler as u64 * (self.compare as u64 + 1);
        (timer_clock_hz as u64 / divisor) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero_and_advances_one_per_tick() {
        let counter = MillisCounter::new();
        assert_eq!(counter.now(), 0);

        for expected in 1..=250 {
            counter.tick();
            assert_eq!(counter.now(), expected);
        }
    }

    #[test]
    fn elapsed_since_survives_wraparound() {
        let counter = MillisCounter::new();
        counter.tick();
        counter.tick();
        assert_eq!(counter.elapsed_since(u32::MAX - 2), 5);
    }

    #[test]
    fn trimmed_timer_matches_shipped_compare_value() {
        // 1 MHz core clock, /8 prescaler, compare trimmed from 124 to 131.
        let config = TickTimerConfig::for_millis(1_000_000, 8, 7);
        assert_eq!(config.prescaler, 8);
        assert_eq!(config.compare, 131);
    }

    #[test]
    fn untrimmed_timer_ticks_at_one_kilohertz() {
        let config = TickTimerConfig::for_millis(16_000_000, 1, 0);
        assert_eq!(config.compare, 15_999);
        assert_eq!(config.tick_hz(16_000_000), TICK_HZ);
    }

    #[test]
    fn negative_trim_saturates_at_zero() {
        let config = TickTimerConfig::for_millis(1_000, 1, -10);
        assert_eq!(config.compare, 0);
    }
}
