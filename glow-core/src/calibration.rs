//! Reading-to-duration calibration.
//!
//! The table maps every 8-bit sensor reading to a preheat time in whole
//! seconds. Zero entries mean "skip preheat". Outside those skip regions the
//! table is monotone so a colder engine never gets a shorter preheat than a
//! warmer one.

use crate::clock::Millis;
use crate::sampler::SensorReading;

/// Number of entries in a calibration table (one per 8-bit reading).
pub const TABLE_LEN: usize = 256;

/// Longest preheat any calibration may request.
pub const MAX_PREHEAT_SECONDS: u8 = 30;

/// Direction in which preheat time grows with the sensor reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableDirection {
    /// Higher readings never map to shorter preheats.
    NonDecreasing,
    /// Higher readings never map to longer preheats.
    NonIncreasing,
}

/// Immutable reading-to-seconds lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CalibrationTable {
    seconds: [u8; TABLE_LEN],
}

impl CalibrationTable {
    /// Wraps a raw 256-entry table.
    #[must_use]
    pub const fn new(seconds: [u8; TABLE_LEN]) -> Self {
        Self { seconds }
    }

    /// Preheat duration in seconds for `reading`.
    #[must_use]
    pub const fn lookup(&self, reading: SensorReading) -> u8 {
        self.seconds[reading.value() as usize]
    }

    /// Preheat duration in milliseconds for `reading`.
    #[must_use]
    pub const fn lookup_ms(&self, reading: SensorReading) -> Millis {
        self.lookup(reading) as Millis * 1_000
    }

    /// Longest preheat the table can produce.
    #[must_use]
    pub fn max_seconds(&self) -> u8 {
        self.seconds.iter().copied().max().unwrap_or(0)
    }

    /// Reports how durations move across the non-zero part of the table.
    ///
    /// Returns `None` when the non-zero entries rise and fall. A table that is
    /// flat (or entirely zero) reports [`TableDirection::NonDecreasing`].
    #[must_use]
    pub fn direction(&self) -> Option<TableDirection> {
        let mut rising = true;
        let mut falling = true;
        let mut previous: Option<u8> = None;

        for &value in self.seconds.iter().filter(|&&value| value != 0) {
            if let Some(prev) = previous {
                rising &= value >= prev;
                falling &= value <= prev;
            }
            previous = Some(value);
        }

        match (rising, falling) {
            (true, _) => Some(TableDirection::NonDecreasing),
            (false, true) => Some(TableDirection::NonIncreasing),
            (false, false) => None,
        }
    }

    /// Returns `true` when zero entries only appear as runs at either end.
    ///
    /// A zero in the middle of the non-zero span would be a gap: a reading
    /// that skips preheat while both neighbours glow.
    #[must_use]
    pub fn skip_regions_at_edges(&self) -> bool {
        let first = self.seconds.iter().position(|&value| value != 0);
        let last = self.seconds.iter().rposition(|&value| value != 0);

        match (first, last) {
            (Some(first), Some(last)) => self.seconds[first..=last].iter().all(|&value| value != 0),
            _ => true,
        }
    }

    /// Checks every structural property a shipped table must satisfy.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.max_seconds() <= MAX_PREHEAT_SECONDS
            && self.direction().is_some()
            && self.skip_regions_at_edges()
    }
}

/// Calibration shipped with the stock firmware.
///
/// Readings 0-13 skip preheat; the duration then climbs from 3 s to the 30 s
/// cap as the reading rises.
pub const STOCK_TABLE: CalibrationTable = CalibrationTable::new([
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,  3,
     3,  3,  3,  3,  3,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,
     4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,
     4,  4,  4,  4,  4,  4,  5,  5,  5,  5,  5,  5,  5,  5,  5,  5,
     5,  5,  5,  5,  5,  5,  5,  5,  5,  6,  6,  6,  6,  6,  6,  6,
     6,  6,  6,  6,  6,  7,  7,  7,  7,  7,  7,  7,  7,  8,  8,  8,
     8,  8,  8,  8,  9,  9,  9,  9,  9, 10, 10, 10, 10, 11, 11, 11,
    11, 12, 12, 12, 13, 13, 14, 14, 15, 15, 16, 16, 17, 17, 18, 19,
    20, 20, 21, 22, 23, 25, 26, 27, 29, 30, 30, 30, 30, 30, 30, 30,
    30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
]);

/// Looks `reading` up in [`STOCK_TABLE`].
#[must_use]
pub const fn lookup(reading: SensorReading) -> u8 {
    STOCK_TABLE.lookup(reading)
}
