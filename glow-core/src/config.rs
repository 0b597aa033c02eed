//! Tunables for one preheat cycle.
//!
//! Every constant the controller depends on lives in [`GlowConfig`] so a
//! firmware variant is just a different value of that struct.

use core::fmt;

use crate::calibration::{CalibrationTable, STOCK_TABLE};
use crate::clock::Millis;
use crate::crank::EdgePolarity;
use crate::sampler::SamplerConfig;

/// Default extra time allowed past the nominal preheat.
pub const DEFAULT_SAFETY_MARGIN_MS: Millis = 30_000;
/// Default heartbeat toggle interval.
pub const DEFAULT_HEARTBEAT_PERIOD_MS: Millis = 500;

/// Lowest conversion clock the converter tolerates.
pub const ADC_CLOCK_MIN_HZ: u32 = 50_000;
/// Highest conversion clock that still yields full resolution.
pub const ADC_CLOCK_MAX_HZ: u32 = 200_000;

/// Converter reference voltage selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcReference {
    /// Supply rail.
    Vcc,
    /// Internal bandgap reference.
    Internal,
}

/// Analog front-end settings applied once before sampling.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcConfig {
    /// Input channel index.
    pub channel: u8,
    /// Result is left-aligned so the high byte carries the 8-bit reading.
    pub left_aligned: bool,
    pub reference: AdcReference,
    /// Core clock divider feeding the converter.
    pub prescaler: u8,
}

impl AdcConfig {
    /// Channel 3, VCC reference, /64 prescaler: a 1 MHz core clocks the
    /// converter at 15.6 kHz and an 8 MHz core at 125 kHz.
    pub const DEFAULT: Self = Self {
        channel: 3,
        left_aligned: true,
        reference: AdcReference::Vcc,
        prescaler: 64,
    };

    /// Conversion clock produced from `cpu_hz` by this prescaler.
    #[must_use]
    pub const fn conversion_clock_hz(&self, cpu_hz: u32) -> u32 {
        if self.prescaler == 0 {
            return cpu_hz;
        }
        cpu_hz / self.prescaler as u32
    }

    /// Returns `true` when the conversion clock sits inside the datasheet window.
    #[must_use]
    pub const fn clock_in_range(&self, cpu_hz: u32) -> bool {
        let hz = self.conversion_clock_hz(cpu_hz);
        hz >= ADC_CLOCK_MIN_HZ && hz <= ADC_CLOCK_MAX_HZ
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Picks the smallest power-of-two prescaler (2 to 128) that puts the
/// conversion clock between 50 and 200 kHz.
#[must_use]
pub const fn adc_prescaler_for(cpu_hz: u32) -> Option<u8> {
    let mut prescaler: u32 = 2;
    while prescaler <= 128 {
        let hz = cpu_hz / prescaler;
        if hz >= ADC_CLOCK_MIN_HZ && hz <= ADC_CLOCK_MAX_HZ {
            return Some(prescaler as u8);
        }
        prescaler *= 2;
    }
    None
}

/// How the glow loop reacts to the crank signal and the nominal duration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CancelPolicy {
    /// Leave `Glowing` as soon as the duration elapses or the engine cranks.
    #[default]
    ImmediateCancel,
    /// Keep glowing past the duration until a crank or the safety deadline.
    SafetyMarginHold,
    /// Drop the glow output when the duration elapses, but keep watching for
    /// a crank until the safety deadline.
    TimedOutputToggle,
}

impl CancelPolicy {
    pub const ALL: [CancelPolicy; 3] = [
        CancelPolicy::ImmediateCancel,
        CancelPolicy::SafetyMarginHold,
        CancelPolicy::TimedOutputToggle,
    ];

    /// Short name used on command lines and in transcripts.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            CancelPolicy::ImmediateCancel => "immediate",
            CancelPolicy::SafetyMarginHold => "hold",
            CancelPolicy::TimedOutputToggle => "toggle",
        }
    }

    /// Parses a policy from its [`tag`](Self::tag), ignoring ASCII case.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.tag().eq_ignore_ascii_case(tag))
    }

    /// Returns `true` when the loop runs until the safety deadline.
    #[must_use]
    pub const fn uses_safety_deadline(self) -> bool {
        !matches!(self, CancelPolicy::ImmediateCancel)
    }
}

impl fmt::Display for CancelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Every tunable for one preheat cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GlowConfig {
    pub sampler: SamplerConfig,
    pub safety_margin_ms: Millis,
    pub heartbeat_period_ms: Millis,
    pub policy: CancelPolicy,
    pub crank_polarity: EdgePolarity,
    pub table: &'static CalibrationTable,
}

impl GlowConfig {
    /// Stock firmware settings.
    pub const DEFAULT: Self = Self {
        sampler: SamplerConfig::DEFAULT,
        safety_margin_ms: DEFAULT_SAFETY_MARGIN_MS,
        heartbeat_period_ms: DEFAULT_HEARTBEAT_PERIOD_MS,
        policy: CancelPolicy::ImmediateCancel,
        crank_polarity: EdgePolarity::Rising,
        table: &STOCK_TABLE,
    };

    #[must_use]
    pub const fn with_policy(mut self, policy: CancelPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_table(mut self, table: &'static CalibrationTable) -> Self {
        self.table = table;
        self
    }

    #[must_use]
    pub const fn with_safety_margin(mut self, margin_ms: Millis) -> Self {
        self.safety_margin_ms = margin_ms;
        self
    }

    #[must_use]
    pub const fn with_heartbeat_period(mut self, period_ms: Millis) -> Self {
        self.heartbeat_period_ms = period_ms;
        self
    }

    #[must_use]
    pub const fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    #[must_use]
    pub const fn with_crank_polarity(mut self, polarity: EdgePolarity) -> Self {
        self.crank_polarity = polarity;
        self
    }

    /// Rejects settings the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.sample_count == 0 {
            return Err(ConfigError::ZeroSampleCount);
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError::ZeroHeartbeatPeriod);
        }
        if !self.table.is_well_formed() {
            return Err(ConfigError::MalformedTable);
        }
        let longest = Millis::from(self.table.max_seconds()) * 1_000;
        if longest.checked_add(self.safety_margin_ms).is_none() {
            return Err(ConfigError::DeadlineOverflow);
        }
        Ok(())
    }
}

impl Default for GlowConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Reasons a [`GlowConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    ZeroSampleCount,
    ZeroHeartbeatPeriod,
    /// Entries exceed the 30 s cap, are not monotone, or leave a zero gap.
    MalformedTable,
    DeadlineOverflow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSampleCount => f.write_str("sample count must be at least 1"),
            ConfigError::ZeroHeartbeatPeriod => f.write_str("heartbeat period must be at least 1 ms"),
            ConfigError::MalformedTable => {
                f.write_str("calibration table is capped at 30 s, monotone and gap-free")
            }
            ConfigError::DeadlineOverflow => {
                f.write_str("longest preheat plus safety margin overflows the millisecond clock")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::TABLE_LEN;

    #[test]
    fn stock_config_validates() {
        assert_eq!(GlowConfig::DEFAULT.validate(), Ok(()));
        assert_eq!(GlowConfig::DEFAULT.sampler.sample_count, 10);
        assert_eq!(GlowConfig::DEFAULT.sampler.settle_delay_ms, 100);
        assert_eq!(GlowConfig::DEFAULT.sampler.sample_spacing_ms, 1);
        assert_eq!(GlowConfig::DEFAULT.safety_margin_ms, 30_000);
        assert_eq!(GlowConfig::DEFAULT.heartbeat_period_ms, 500);
    }

    #[test]
    fn zero_sample_count_is_rejected() {
        let config = GlowConfig::DEFAULT.with_sampler(SamplerConfig {
            sample_count: 0,
            ..SamplerConfig::DEFAULT
        });
        assert_eq!(config.validate(), Err(ConfigError::ZeroSampleCount));
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let config = GlowConfig::DEFAULT.with_heartbeat_period(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroHeartbeatPeriod));
    }

    #[test]
    fn overflowing_margin_is_rejected() {
        let config = GlowConfig::DEFAULT.with_safety_margin(u32::MAX);
        assert_eq!(config.validate(), Err(ConfigError::DeadlineOverflow));
    }

    static OVER_CAP: CalibrationTable = CalibrationTable::new([200; TABLE_LEN]);
    static GAPPED: CalibrationTable = CalibrationTable::new(gapped_entries());

    const fn gapped_entries() -> [u8; TABLE_LEN] {
        let mut entries = [5; TABLE_LEN];
        entries[100] = 0;
        entries
    }

    #[test]
    fn malformed_tables_are_rejected() {
        assert_eq!(
            GlowConfig::DEFAULT.with_table(&OVER_CAP).validate(),
            Err(ConfigError::MalformedTable)
        );
        assert_eq!(
            GlowConfig::DEFAULT.with_table(&GAPPED).validate(),
            Err(ConfigError::MalformedTable)
        );
    }

    #[test]
    fn policy_tags_round_trip_case_insensitively() {
        for policy in CancelPolicy::ALL {
            assert_eq!(CancelPolicy::from_tag(policy.tag()), Some(policy));
        }
        assert_eq!(
            CancelPolicy::from_tag("HOLD"),
            Some(CancelPolicy::SafetyMarginHold)
        );
        assert_eq!(CancelPolicy::from_tag("forever"), None);
    }

    #[test]
    fn prescaler_choice_lands_in_conversion_window() {
        assert_eq!(adc_prescaler_for(1_000_000), Some(8));
        assert_eq!(adc_prescaler_for(4_000_000), Some(32));
        assert_eq!(adc_prescaler_for(8_000_000), Some(64));
        assert_eq!(adc_prescaler_for(16_000_000), Some(128));
        assert_eq!(adc_prescaler_for(64_000_000), None);
    }

    #[test]
    fn default_prescaler_suits_an_eight_megahertz_core() {
        assert!(AdcConfig::DEFAULT.clock_in_range(8_000_000));
        assert!(!AdcConfig::DEFAULT.clock_in_range(1_000_000));
    }
}
