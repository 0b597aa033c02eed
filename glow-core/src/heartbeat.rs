//! Diagnostic blink derived from the millisecond clock.
//!
//! The blink has no effect on glow timing; it only lets someone with a
//! stopwatch confirm the clock runs at the intended rate.

use crate::clock::Millis;

/// Toggle scheduler for the heartbeat output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Heartbeat {
    period_ms: Millis,
    last_toggle: Millis,
    level: bool,
    toggles: u32,
}

impl Heartbeat {
    #[must_use]
    pub const fn new(period_ms: Millis) -> Self {
        Self {
            period_ms,
            last_toggle: 0,
            level: false,
            toggles: 0,
        }
    }

    /// Restarts the schedule with the output low at `now`.
    pub fn start(&mut self, now: Millis) {
        self.last_toggle = now;
        self.level = false;
        self.toggles = 0;
    }

    /// Returns the new output level when at least one period has passed
    /// since the previous toggle.
    pub fn poll(&mut self, now: Millis) -> Option<bool> {
        if now.wrapping_sub(self.last_toggle) < self.period_ms {
            return None;
        }
        self.last_toggle = now;
        self.level = !self.level;
        self.toggles = self.toggles.saturating_add(1);
        Some(self.level)
    }

    #[must_use]
    pub const fn level(&self) -> bool {
        self.level
    }

    #[must_use]
    pub const fn toggles(&self) -> u32 {
        self.toggles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_every_period_from_start() {
        let mut heartbeat = Heartbeat::new(500);
        heartbeat.start(110);

        let mut toggled_at = [0; 4];
        let mut seen = 0;
        for now in 110..=2_110 {
            if heartbeat.poll(now).is_some() {
                toggled_at[seen] = now;
                seen += 1;
            }
        }

        assert_eq!(seen, 4);
        assert_eq!(toggled_at, [610, 1_110, 1_610, 2_110]);
        assert_eq!(heartbeat.toggles(), 4);
        assert!(!heartbeat.level());
    }

    #[test]
    fn sparse_polls_toggle_once_per_poll() {
        let mut heartbeat = Heartbeat::new(500);
        heartbeat.start(0);

        assert_eq!(heartbeat.poll(1_700), Some(true));
        assert_eq!(heartbeat.poll(1_800), None);
        assert_eq!(heartbeat.poll(2_200), Some(false));
    }
}
