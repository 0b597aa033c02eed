//! State shared across the interrupt boundary.

use crate::clock::MillisCounter;
use crate::crank::CrankLatch;

/// The only mutable data touched from interrupt context.
///
/// Firmware keeps one of these in a `static`; the timer ISR only reaches
/// `millis`, the crank ISR only reaches `crank`, and the main loop reads both.
pub struct IsrShared {
    pub millis: MillisCounter,
    pub crank: CrankLatch,
}

impl IsrShared {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            millis: MillisCounter::new(),
            crank: CrankLatch::new(),
        }
    }
}

impl Default for IsrShared {
    fn default() -> Self {
        Self::new()
    }
}
