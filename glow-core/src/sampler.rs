//! Averaged analog sampling.

use crate::config::AdcConfig;
use crate::hal::{AnalogInput, DelayMs};

/// Default number of conversions averaged into one reading.
pub const DEFAULT_SAMPLE_COUNT: u8 = 10;
/// Default wait after power-up before the first conversion.
pub const DEFAULT_SETTLE_DELAY_MS: u32 = 100;
/// Default wait before each conversion.
pub const DEFAULT_SAMPLE_SPACING_MS: u32 = 1;

/// Truncated average of a burst of 8-bit conversions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading(u8);

impl SensorReading {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for SensorReading {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Sampling parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplerConfig {
    pub adc: AdcConfig,
    pub sample_count: u8,
    pub settle_delay_ms: u32,
    pub sample_spacing_ms: u32,
}

impl SamplerConfig {
    pub const DEFAULT: Self = Self {
        adc: AdcConfig::DEFAULT,
        sample_count: DEFAULT_SAMPLE_COUNT,
        settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        sample_spacing_ms: DEFAULT_SAMPLE_SPACING_MS,
    };
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Integer average of `count` samples summing to `sum`, truncated toward zero.
///
/// A zero count yields zero; [`crate::config::GlowConfig::validate`] rejects
/// such configurations before they reach the sampler.
#[must_use]
pub const fn truncated_average(sum: u32, count: u8) -> SensorReading {
    if count == 0 {
        return SensorReading(0);
    }
    let average = sum / count as u32;
    if average > u8::MAX as u32 {
        SensorReading(u8::MAX)
    } else {
        SensorReading(average as u8)
    }
}

/// Analog converter that has been configured for preheat sampling.
pub struct AnalogSampler<A> {
    adc: A,
    config: SamplerConfig,
}

impl<A> AnalogSampler<A>
where
    A: AnalogInput,
{
    /// Configures the converter once and takes ownership of it.
    pub fn new(mut adc: A, config: SamplerConfig) -> Self {
        adc.configure_adc(&config.adc);
        Self { adc, config }
    }

    /// Waits for the analog input to settle after power-up.
    pub fn settle<D>(&mut self, delay: &mut D)
    where
        D: DelayMs + ?Sized,
    {
        delay.delay_ms(self.config.settle_delay_ms);
    }

    /// Takes the configured number of spaced conversions and averages them.
    pub fn collect<D>(&mut self, delay: &mut D) -> SensorReading
    where
        D: DelayMs + ?Sized,
    {
        let mut sum: u32 = 0;
        for _ in 0..self.config.sample_count {
            delay.delay_ms(self.config.sample_spacing_ms);
            sum += u32::from(self.adc.convert_blocking());
        }
        truncated_average(sum, self.config.sample_count)
    }

    /// Settles, then collects one averaged reading.
    pub fn sample_averaged<D>(&mut self, delay: &mut D) -> SensorReading
    where
        D: DelayMs + ?Sized,
    {
        self.settle(delay);
        self.collect(delay)
    }

    /// Releases the underlying converter.
    pub fn into_inner(self) -> A {
        self.adc
    }
}

/// Configures `adc`, settles, and returns one averaged reading.
pub fn sample_averaged<A, D>(adc: A, delay: &mut D, config: &SamplerConfig) -> SensorReading
where
    A: AnalogInput,
    D: DelayMs + ?Sized,
{
    AnalogSampler::new(adc, *config).sample_averaged(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MillisCounter;
    use crate::sim::{ScriptedAdc, TickDelay};

    #[test]
    fn constant_input_averages_to_itself() {
        let clock = MillisCounter::new();
        let mut delay = TickDelay::new(&clock);
        let reading = sample_averaged(ScriptedAdc::new(&[45]), &mut delay, &SamplerConfig::DEFAULT);
        assert_eq!(reading, SensorReading::new(45));
    }

    #[test]
    fn average_truncates_instead_of_rounding() {
        let samples = [50, 50, 50, 50, 50, 50, 50, 50, 50, 59];
        let clock = MillisCounter::new();
        let mut delay = TickDelay::new(&clock);
        let reading = sample_averaged(
            ScriptedAdc::new(&samples),
            &mut delay,
            &SamplerConfig::DEFAULT,
        );
        assert_eq!(reading.value(), 50);
    }

    #[test]
    fn sampler_configures_once_and_converts_exactly_n_times() {
        let clock = MillisCounter::new();
        let mut delay = TickDelay::new(&clock);
        let mut sampler = AnalogSampler::new(ScriptedAdc::new(&[200]), SamplerConfig::DEFAULT);
        let _ = sampler.sample_averaged(&mut delay);

        let adc = sampler.into_inner();
        assert_eq!(adc.configure_calls(), 1);
        assert_eq!(adc.configured(), Some(AdcConfig::DEFAULT));
        assert_eq!(adc.conversions(), u32::from(DEFAULT_SAMPLE_COUNT));
    }

    #[test]
    fn settle_and_spacing_delays_elapse_before_reading() {
        let clock = MillisCounter::new();
        let mut delay = TickDelay::new(&clock);
        let _ = sample_averaged(ScriptedAdc::new(&[1]), &mut delay, &SamplerConfig::DEFAULT);

        let expected = DEFAULT_SETTLE_DELAY_MS
            + u32::from(DEFAULT_SAMPLE_COUNT) * DEFAULT_SAMPLE_SPACING_MS;
        assert_eq!(clock.now(), expected);
    }

    #[test]
    fn full_scale_samples_do_not_overflow() {
        let config = SamplerConfig {
            sample_count: u8::MAX,
            ..SamplerConfig::DEFAULT
        };
        let clock = MillisCounter::new();
        let mut delay = TickDelay::new(&clock);
        let reading = sample_averaged(ScriptedAdc::new(&[255]), &mut delay, &config);
        assert_eq!(reading.value(), 255);
    }

    #[test]
    fn zero_count_average_is_zero() {
        assert_eq!(truncated_average(1_000, 0).value(), 0);
    }
}
