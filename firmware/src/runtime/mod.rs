//! Executor entry point, interrupt handlers and the preheat main loop.

use cortex_m::interrupt;
use cortex_m::register::primask;
use cortex_m_rt::exception;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::yield_now;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use glow_core::machine::{GlowController, configure_interrupts};
use glow_core::sampler::AnalogSampler;
use glow_core::shared::IsrShared;

use crate::hw::adc::GlowAdc;
use crate::hw::board::{BlockingDelay, BoardInterrupts, BoardOutputs, DeepSleepHalt};
use crate::hw::{GLOW_CONFIG, SENSOR_CHANNEL, TICK_TIMER};
use crate::telemetry::{self, EventLog};

pub(crate) mod crank_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Millisecond counter and crank latch shared with the interrupt handlers.
pub(super) static SHARED: IsrShared = IsrShared::new();

#[exception]
fn SysTick() {
    SHARED.millis.tick();
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = GLOW_CONFIG;
    if let Err(err) = config.validate() {
        defmt::panic!("invalid glow configuration: {}", err);
    }

    let hal::Peripherals {
        PA0,
        PA3,
        PA5,
        PA6,
        ADC1,
        EXTI0,
        ..
    } = hal::init(hal::Config::default());
    let core = cortex_m::Peripherals::take().expect("core peripherals taken twice");

    // Outputs start inactive and stay that way until glowing begins.
    let outputs = BoardOutputs::new(
        Output::new(PA6, Level::Low, Speed::Low),
        Output::new(PA5, Level::Low, Speed::Low),
    );
    let crank = ExtiInput::new(PA0, EXTI0, Pull::Down);

    let mut irq = BoardInterrupts::new(core.SYST, spawner, crank);
    configure_interrupts(&mut irq, &TICK_TIMER, &config);
    telemetry::log_config(&config, &TICK_TIMER);

    // Let the crank task arm its edge wait before the blocking settle delay.
    yield_now().await;

    let adc = GlowAdc::new(Adc::new(ADC1), PA3.degrade_adc(), SENSOR_CHANNEL);
    let mut sampler = AnalogSampler::new(adc, config.sampler);
    let mut delay = BlockingDelay;
    let mut log = EventLog::new();
    let mut controller = GlowController::new(config, outputs);

    sampler.settle(&mut delay);
    controller
        .begin_sampling()
        .expect("fresh controller starts idle");
    let reading = sampler.collect(&mut delay);

    let mut exit = controller
        .begin(reading, SHARED.millis.now(), &mut log)
        .expect("controller is sampling");
    while exit.is_none() {
        yield_now().await;
        exit = controller.poll(SHARED.millis.now(), SHARED.crank.is_cranked(), &mut log);
    }

    if let Some(report) = controller.report() {
        telemetry::log_report(&report);
    }

    let mut halt = DeepSleepHalt::new(core.SCB, irq.into_syst());
    controller.shut_down(&mut halt)
}
