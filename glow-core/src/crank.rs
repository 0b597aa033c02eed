//! Sticky crank detection fed by an edge-triggered interrupt.

use portable_atomic::{AtomicBool, Ordering};

/// Edge on the crank input that counts as "engine is being cranked".
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgePolarity {
    #[default]
    Rising,
    Falling,
}

/// Read side of the crank signal as seen by the glow loop.
pub trait CrankSense {
    /// Returns `true` once a crank edge has been observed.
    fn is_cranked(&self) -> bool;
}

impl<C> CrankSense for &C
where
    C: CrankSense + ?Sized,
{
    fn is_cranked(&self) -> bool {
        (**self).is_cranked()
    }
}

/// One-bit latch set by the crank interrupt and never cleared until restart.
///
/// A single byte store/load is atomic on every supported core, so no masking
/// is needed here.
pub struct CrankLatch {
    cranked: AtomicBool,
}

impl CrankLatch {
    /// Creates a latch in the "not cranked" state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cranked: AtomicBool::new(false),
        }
    }

    /// Marks the engine as cranked. Call from the crank interrupt only.
    pub fn on_crank_edge(&self) {
        self.cranked.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once any crank edge has fired.
    #[must_use]
    pub fn is_cranked(&self) -> bool {
        self.cranked.load(Ordering::Relaxed)
    }
}

impl Default for CrankLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl CrankSense for CrankLatch {
    fn is_cranked(&self) -> bool {
        CrankLatch::is_cranked(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_starts_clear() {
        let latch = CrankLatch::new();
        assert!(!latch.is_cranked());
    }

    #[test]
    fn latch_stays_set_after_repeated_edges() {
        let latch = CrankLatch::new();
        latch.on_crank_edge();
        assert!(latch.is_cranked());

        for _ in 0..16 {
            latch.on_crank_edge();
            assert!(latch.is_cranked());
        }
    }
}
