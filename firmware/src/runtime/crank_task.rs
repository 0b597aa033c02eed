use embassy_stm32::exti::ExtiInput;
use glow_core::crank::EdgePolarity;

use super::SHARED;

/// Latches the first crank edge. The edge interrupt stays armed for the
/// lifetime of the firmware; later edges are harmless.
#[embassy_executor::task]
pub async fn run(mut crank: ExtiInput<'static>, polarity: EdgePolarity) {
    loop {
        match polarity {
            EdgePolarity::Rising => crank.wait_for_rising_edge().await,
            EdgePolarity::Falling => crank.wait_for_falling_edge().await,
        }
        SHARED.crank.on_crank_edge();
    }
}
