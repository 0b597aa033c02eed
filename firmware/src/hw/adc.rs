//! Coolant sensor sampling on ADC1.

use embassy_stm32::adc::{Adc, AnyAdcChannel, Resolution, SampleTime};
use embassy_stm32::peripherals::ADC1;
use glow_core::config::{AdcConfig, AdcReference};
use glow_core::hal::AnalogInput;

/// Embassy ADC wrapper exposing the single-shot interface the sampler expects.
///
/// The G0 converter has no separate start/poll API in Embassy, so the
/// conversion runs to completion in `start_conversion` and is reported done
/// straight away.
pub struct GlowAdc<'d> {
    adc: Adc<'d, ADC1>,
    channel: AnyAdcChannel<ADC1>,
    /// Hardware channel index behind `channel`.
    wired_channel: u8,
    result: u8,
}

impl<'d> GlowAdc<'d> {
    pub fn new(adc: Adc<'d, ADC1>, channel: AnyAdcChannel<ADC1>, wired_channel: u8) -> Self {
        Self {
            adc,
            channel,
            wired_channel,
            result: 0,
        }
    }
}

impl AnalogInput for GlowAdc<'_> {
    fn configure_adc(&mut self, config: &AdcConfig) {
        if config.channel != self.wired_channel {
            defmt::panic!(
                "adc: config selects channel {} but the sensor is wired to {}",
                config.channel,
                self.wired_channel
            );
        }
        // 8-bit results land in the low byte, matching the high byte of a
        // left-aligned 10-bit read.
        self.adc.set_resolution(Resolution::BITS8);
        self.adc.set_sample_time(SampleTime::CYCLES79_5);
        if config.reference == AdcReference::Internal {
            defmt::warn!("adc: internal reference not wired on this board, using VREF+");
        }
        defmt::debug!("adc: channel={} resolution=8 bit", config.channel);
    }

    fn start_conversion(&mut self) {
        let raw = self.adc.blocking_read(&mut self.channel);
        self.result = u8::try_from(raw).unwrap_or(u8::MAX);
    }

    fn conversion_done(&mut self) -> bool {
        true
    }

    fn read_result(&mut self) -> u8 {
        self.result
    }
}
