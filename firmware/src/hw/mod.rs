//! Board wiring for the STM32G0 glow timer.
//!
//! | Signal          | Pin | Notes                              |
//! |-----------------|-----|------------------------------------|
//! | crank sense     | PA0 | EXTI0, pulled down, edge triggered |
//! | coolant sensor  | PA3 | ADC1 channel 3                     |
//! | heartbeat LED   | PA5 | push-pull, active high             |
//! | glow relay      | PA6 | push-pull, active high             |

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use glow_core::clock::TickTimerConfig;
use glow_core::config::GlowConfig;

#[cfg(target_os = "none")]
pub mod adc;
#[cfg(target_os = "none")]
pub mod board;

/// HSI16 after reset; `hal::Config::default()` leaves it as the system clock.
pub const CORE_CLOCK_HZ: u32 = 16_000_000;

/// Reload adjustment for the SysTick millisecond tick. Tune against the
/// heartbeat blink on boards whose oscillator drifts.
pub const TICK_TRIM: i32 = 0;

/// SysTick runs from the core clock without a prescaler.
pub const TICK_TIMER: TickTimerConfig = TickTimerConfig::for_millis(CORE_CLOCK_HZ, 1, TICK_TRIM);

/// ADC1 input the coolant sensor is wired to (PA3).
pub const SENSOR_CHANNEL: u8 = 3;

/// Preheat settings flashed into this board. The ADC kernel clock comes from
/// the embassy defaults, so the prescaler field is not used here.
pub const GLOW_CONFIG: GlowConfig = GlowConfig::DEFAULT;

#[cfg(test)]
mod tests {
    use super::*;
    use glow_core::clock::TICK_HZ;

    #[test]
    fn systick_reload_yields_one_millisecond() {
        assert_eq!(TICK_TIMER.compare, 15_999);
        assert_eq!(TICK_TIMER.tick_hz(CORE_CLOCK_HZ), TICK_HZ);
    }

    #[test]
    fn board_config_is_valid() {
        assert_eq!(GLOW_CONFIG.validate(), Ok(()));
        assert_eq!(GLOW_CONFIG.sampler.adc.channel, SENSOR_CHANNEL);
    }
}
