//! Telemetry event catalog shared by firmware and host targets.
//!
//! Events carry compact numeric codes so they can be shipped over a debug
//! channel, and a fixed-size ring keeps the most recent ones for inspection
//! after a run.

use core::fmt;

use heapless::HistoryBuf;

use crate::clock::Millis;
use crate::machine::ExitReason;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Discriminated events emitted during a preheat cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GlowEventKind {
    /// Averaged sensor reading taken before glowing.
    SampleAveraged(u8),
    GlowAsserted,
    GlowReleased,
    /// Heartbeat output switched to the carried level.
    HeartbeatToggled(bool),
    CrankDetected,
    Halted(ExitReason),
    Custom(u16),
}

impl fmt::Display for GlowEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlowEventKind::SampleAveraged(reading) => write!(f, "sample-averaged {reading}"),
            GlowEventKind::GlowAsserted => f.write_str("glow-asserted"),
            GlowEventKind::GlowReleased => f.write_str("glow-released"),
            GlowEventKind::HeartbeatToggled(level) => {
                write!(f, "heartbeat {}", if *level { "on" } else { "off" })
            }
            GlowEventKind::CrankDetected => f.write_str("crank-detected"),
            GlowEventKind::Halted(reason) => write!(f, "halted {reason}"),
            GlowEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl GlowEventKind {
    const GLOW_ASSERTED_CODE: u16 = 0x0001;
    const GLOW_RELEASED_CODE: u16 = 0x0002;
    const HEARTBEAT_OFF_CODE: u16 = 0x0003;
    const HEARTBEAT_ON_CODE: u16 = 0x0004;
    const CRANK_DETECTED_CODE: u16 = 0x0005;
    const HALTED_BASE: u16 = 0x0010;
    const SAMPLE_BASE: u16 = 0x0100;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            GlowEventKind::SampleAveraged(reading) => Self::SAMPLE_BASE + reading as u16,
            GlowEventKind::GlowAsserted => Self::GLOW_ASSERTED_CODE,
            GlowEventKind::GlowReleased => Self::GLOW_RELEASED_CODE,
            GlowEventKind::HeartbeatToggled(false) => Self::HEARTBEAT_OFF_CODE,
            GlowEventKind::HeartbeatToggled(true) => Self::HEARTBEAT_ON_CODE,
            GlowEventKind::CrankDetected => Self::CRANK_DETECTED_CODE,
            GlowEventKind::Halted(reason) => Self::HALTED_BASE + reason.index(),
            GlowEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`GlowEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::GLOW_ASSERTED_CODE => GlowEventKind::GlowAsserted,
            Self::GLOW_RELEASED_CODE => GlowEventKind::GlowReleased,
            Self::HEARTBEAT_OFF_CODE => GlowEventKind::HeartbeatToggled(false),
            Self::HEARTBEAT_ON_CODE => GlowEventKind::HeartbeatToggled(true),
            Self::CRANK_DETECTED_CODE => GlowEventKind::CrankDetected,
            value if (Self::HALTED_BASE..Self::SAMPLE_BASE).contains(&value) => {
                ExitReason::from_index(value - Self::HALTED_BASE)
                    .map_or(GlowEventKind::Custom(value), GlowEventKind::Halted)
            }
            value if value >= Self::SAMPLE_BASE => u8::try_from(value - Self::SAMPLE_BASE)
                .map_or(GlowEventKind::Custom(value), GlowEventKind::SampleAveraged),
            other => GlowEventKind::Custom(other),
        }
    }
}

/// Destination for events emitted by the glow state machine.
pub trait EventSink {
    fn emit(&mut self, timestamp: Millis, event: GlowEventKind);
}

impl<S> EventSink for &mut S
where
    S: EventSink + ?Sized,
{
    fn emit(&mut self, timestamp: Millis, event: GlowEventKind) {
        (**self).emit(timestamp, event);
    }
}

/// Sink that drops every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&mut self, _: Millis, _: GlowEventKind) {}
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Millis,
    pub event: GlowEventKind,
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Stores `event` and returns its identifier.
    pub fn record(&mut self, event: GlowEventKind, timestamp: Millis) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });

        id
    }

    /// Timestamp of the first recorded occurrence of `event`, if still retained.
    pub fn first_time_of(&self, event: GlowEventKind) -> Option<Millis> {
        self.oldest_first()
            .find(|record| record.event == event)
            .map(|record| record.timestamp)
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> EventSink for TelemetryRecorder<CAPACITY> {
    fn emit(&mut self, timestamp: Millis, event: GlowEventKind) {
        self.record(event, timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_decode_to_the_same_event() {
        let events = [
            GlowEventKind::SampleAveraged(0),
            GlowEventKind::SampleAveraged(255),
            GlowEventKind::GlowAsserted,
            GlowEventKind::GlowReleased,
            GlowEventKind::HeartbeatToggled(true),
            GlowEventKind::HeartbeatToggled(false),
            GlowEventKind::CrankDetected,
            GlowEventKind::Halted(ExitReason::Cranked),
            GlowEventKind::Halted(ExitReason::SafetyDeadline),
        ];
        for event in events {
            assert_eq!(GlowEventKind::from_raw(event.to_raw()), event);
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_custom() {
        assert_eq!(GlowEventKind::from_raw(0x0042), GlowEventKind::Custom(0x0042));
        assert_eq!(GlowEventKind::from_raw(0x0300), GlowEventKind::Custom(0x0300));
    }

    #[test]
    fn recorder_assigns_sequential_ids_and_keeps_order() {
        let mut recorder: TelemetryRecorder<4> = TelemetryRecorder::new();
        assert!(recorder.is_empty());

        let first = recorder.record(GlowEventKind::GlowAsserted, 110);
        let second = recorder.record(GlowEventKind::HeartbeatToggled(true), 610);
        assert_eq!((first, second), (0, 1));

        let latest = recorder.latest().copied().expect("latest record");
        assert_eq!(latest.event, GlowEventKind::HeartbeatToggled(true));
        assert_eq!(recorder.first_time_of(GlowEventKind::GlowAsserted), Some(110));
    }

    #[test]
    fn ring_drops_oldest_records_when_full() {
        let mut recorder: TelemetryRecorder<2> = TelemetryRecorder::new();
        recorder.emit(1, GlowEventKind::GlowAsserted);
        recorder.emit(2, GlowEventKind::CrankDetected);
        recorder.emit(3, GlowEventKind::GlowReleased);

        assert_eq!(recorder.len(), 2);
        let oldest = recorder.oldest_first().next().expect("oldest record");
        assert_eq!(oldest.event, GlowEventKind::CrankDetected);
        assert_eq!(recorder.first_time_of(GlowEventKind::GlowAsserted), None);
    }
}
