//! Glow-plug preheat state machine.
//!
//! A run walks `Idle -> Sampling -> Glowing -> Halted` exactly once. The
//! controller can be driven two ways: [`GlowController::run`] busy-polls a
//! clock and crank latch until the cycle ends, while [`GlowController::begin`]
//! and [`GlowController::poll`] let an executor interleave the loop with other
//! work. Both paths share the same transition and policy logic.
//!
//! Glow and safety deadlines are absolute millisecond-clock values, so the
//! settle and sampling time since power-up counts against the preheat.

use core::fmt;

use crate::clock::{Clock, Millis, TickTimerConfig};
use crate::config::{CancelPolicy, GlowConfig};
use crate::crank::CrankSense;
use crate::hal::{AnalogInput, DelayMs, GlowOutputs, InterruptSetup, LowPowerHalt, OutputLine};
use crate::heartbeat::Heartbeat;
use crate::sampler::{AnalogSampler, SensorReading};
use crate::telemetry::{EventSink, GlowEventKind};

/// Phases of a preheat cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GlowState {
    Idle,
    Sampling,
    Glowing,
    Halted,
}

impl GlowState {
    /// Returns `true` once the cycle can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, GlowState::Halted)
    }

    /// Returns `true` when `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: GlowState) -> bool {
        matches!(
            (self, next),
            (GlowState::Idle, GlowState::Sampling)
                | (GlowState::Sampling, GlowState::Glowing | GlowState::Halted)
                | (GlowState::Glowing, GlowState::Halted)
        )
    }
}

impl fmt::Display for GlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GlowState::Idle => "idle",
            GlowState::Sampling => "sampling",
            GlowState::Glowing => "glowing",
            GlowState::Halted => "halted",
        })
    }
}

/// Failure reported when attempting an invalid state transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionError {
    pub from: GlowState,
    pub to: GlowState,
}

impl TransitionError {
    #[must_use]
    pub const fn new(from: GlowState, to: GlowState) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition {} -> {}", self.from, self.to)
    }
}

/// Why the controller reached `Halted`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExitReason {
    /// The reading mapped to a zero-second preheat.
    SkippedZeroDuration,
    /// The nominal preheat elapsed without a crank.
    DurationElapsed,
    /// The crank latch fired.
    Cranked,
    /// The safety deadline passed without a crank.
    SafetyDeadline,
}

impl ExitReason {
    /// Deterministic index used for telemetry codes.
    #[must_use]
    pub const fn index(self) -> u16 {
        match self {
            ExitReason::SkippedZeroDuration => 0,
            ExitReason::DurationElapsed => 1,
            ExitReason::Cranked => 2,
            ExitReason::SafetyDeadline => 3,
        }
    }

    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(ExitReason::SkippedZeroDuration),
            1 => Some(ExitReason::DurationElapsed),
            2 => Some(ExitReason::Cranked),
            3 => Some(ExitReason::SafetyDeadline),
            _ => None,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::SkippedZeroDuration => "skipped-zero-duration",
            ExitReason::DurationElapsed => "duration-elapsed",
            ExitReason::Cranked => "cranked",
            ExitReason::SafetyDeadline => "safety-deadline",
        })
    }
}

/// Deadlines derived once from the averaged reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlowPlan {
    pub reading: SensorReading,
    pub glow_duration_ms: Millis,
    /// Latest time the loop may keep running. Equals `glow_duration_ms` under
    /// [`CancelPolicy::ImmediateCancel`].
    pub safety_deadline_ms: Millis,
}

impl GlowPlan {
    /// Looks the reading up and applies the policy's margin.
    #[must_use]
    pub fn derive(reading: SensorReading, config: &GlowConfig) -> Self {
        let glow_duration_ms = config.table.lookup_ms(reading);
        let safety_deadline_ms = if config.policy.uses_safety_deadline() {
            glow_duration_ms.saturating_add(config.safety_margin_ms)
        } else {
            glow_duration_ms
        };

        Self {
            reading,
            glow_duration_ms,
            safety_deadline_ms,
        }
    }

    /// Returns `true` when no preheat is needed.
    #[must_use]
    pub const fn skips_preheat(&self) -> bool {
        self.glow_duration_ms == 0
    }
}

/// Summary of a finished cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlowReport {
    pub plan: GlowPlan,
    pub policy: CancelPolicy,
    pub exit: ExitReason,
    pub glow_started_at: Option<Millis>,
    /// When the glow output went inactive; `None` if it was never asserted.
    pub glow_released_at: Option<Millis>,
    pub exited_at: Millis,
    pub heartbeat_toggles: u32,
}

/// Sets up both interrupt sources before the cycle starts.
pub fn configure_interrupts<I>(irq: &mut I, timer: &TickTimerConfig, config: &GlowConfig)
where
    I: InterruptSetup + ?Sized,
{
    irq.configure_timer(timer);
    irq.configure_edge_interrupt(config.crank_polarity);
}

/// Preheat controller driving the glow and heartbeat outputs.
pub struct GlowController<O> {
    config: GlowConfig,
    outputs: O,
    state: GlowState,
    plan: Option<GlowPlan>,
    heartbeat: Heartbeat,
    glow_active: bool,
    crank_reported: bool,
    glow_started_at: Option<Millis>,
    glow_released_at: Option<Millis>,
    exit: Option<(ExitReason, Millis)>,
}

impl<O> GlowController<O>
where
    O: GlowOutputs,
{
    /// Creates an idle controller. Outputs are not touched until glowing starts.
    pub fn new(config: GlowConfig, outputs: O) -> Self {
        Self {
            heartbeat: Heartbeat::new(config.heartbeat_period_ms),
            config,
            outputs,
            state: GlowState::Idle,
            plan: None,
            glow_active: false,
            crank_reported: false,
            glow_started_at: None,
            glow_released_at: None,
            exit: None,
        }
    }

    pub fn state(&self) -> GlowState {
        self.state
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    /// Returns `true` while the glow output is driven active.
    pub fn glow_active(&self) -> bool {
        self.glow_active
    }

    pub fn into_outputs(self) -> O {
        self.outputs
    }

    fn set_state(&mut self, next: GlowState) -> Result<(), TransitionError> {
        if self.state.can_transition_to(next) {
            self.state = next;
            Ok(())
        } else {
            Err(TransitionError::new(self.state, next))
        }
    }

    /// Moves from `Idle` to `Sampling` once peripherals are configured and the
    /// input has settled.
    pub fn begin_sampling(&mut self) -> Result<(), TransitionError> {
        self.set_state(GlowState::Sampling)
    }

    /// Consumes the averaged reading and either starts glowing or halts
    /// straight away when the table asks for no preheat.
    ///
    /// Returns the exit reason when the cycle ended immediately.
    pub fn begin<S>(
        &mut self,
        reading: SensorReading,
        now: Millis,
        sink: &mut S,
    ) -> Result<Option<ExitReason>, TransitionError>
    where
        S: EventSink + ?Sized,
    {
        if self.state != GlowState::Sampling {
            return Err(TransitionError::new(self.state, GlowState::Glowing));
        }

        sink.emit(now, GlowEventKind::SampleAveraged(reading.value()));
        let plan = GlowPlan::derive(reading, &self.config);
        self.plan = Some(plan);

        if plan.skips_preheat() {
            self.halt(now, ExitReason::SkippedZeroDuration, sink)?;
            return Ok(Some(ExitReason::SkippedZeroDuration));
        }

        self.set_state(GlowState::Glowing)?;
        self.outputs.apply(OutputLine::Glow, true);
        self.glow_active = true;
        self.glow_started_at = Some(now);
        self.heartbeat.start(now);
        sink.emit(now, GlowEventKind::GlowAsserted);
        Ok(None)
    }

    /// Advances the glow loop by one iteration.
    ///
    /// Returns `Some(reason)` once the cycle has halted (including on calls
    /// made after that point) and `None` while it should keep polling. Calls
    /// made before [`begin`](Self::begin) return `None` without effect.
    pub fn poll<S>(&mut self, now: Millis, cranked: bool, sink: &mut S) -> Option<ExitReason>
    where
        S: EventSink + ?Sized,
    {
        match self.state {
            GlowState::Halted => return self.exit.map(|(reason, _)| reason),
            GlowState::Idle | GlowState::Sampling => return None,
            GlowState::Glowing => {}
        }
        let plan = self.plan?;

        if cranked && !self.crank_reported {
            self.crank_reported = true;
            sink.emit(now, GlowEventKind::CrankDetected);
        }

        let exit = match self.config.policy {
            CancelPolicy::ImmediateCancel => {
                if cranked {
                    Some(ExitReason::Cranked)
                } else if now >= plan.glow_duration_ms {
                    Some(ExitReason::DurationElapsed)
                } else {
                    None
                }
            }
            CancelPolicy::SafetyMarginHold => Self::deadline_exit(&plan, now, cranked),
            CancelPolicy::TimedOutputToggle => {
                if self.glow_active && now >= plan.glow_duration_ms {
                    self.release_glow(now, sink);
                }
                Self::deadline_exit(&plan, now, cranked)
            }
        };

        if let Some(reason) = exit {
            self.finish(now, reason, sink);
            return Some(reason);
        }

        if let Some(level) = self.heartbeat.poll(now) {
            self.outputs.apply(OutputLine::Heartbeat, level);
            sink.emit(now, GlowEventKind::HeartbeatToggled(level));
        }

        None
    }

    fn deadline_exit(plan: &GlowPlan, now: Millis, cranked: bool) -> Option<ExitReason> {
        if cranked {
            Some(ExitReason::Cranked)
        } else if now >= plan.safety_deadline_ms {
            Some(ExitReason::SafetyDeadline)
        } else {
            None
        }
    }

    fn release_glow<S>(&mut self, now: Millis, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        self.outputs.apply(OutputLine::Glow, false);
        self.glow_active = false;
        self.glow_released_at = Some(now);
        sink.emit(now, GlowEventKind::GlowReleased);
    }

    fn halt<S>(&mut self, now: Millis, reason: ExitReason, sink: &mut S) -> Result<(), TransitionError>
    where
        S: EventSink + ?Sized,
    {
        self.set_state(GlowState::Halted)?;
        self.finish(now, reason, sink);
        Ok(())
    }

    /// Enters `Halted`, releases the outputs and records the exit.
    ///
    /// Only called from `Glowing` or after [`halt`](Self::halt) checked the
    /// transition.
    fn finish<S>(&mut self, now: Millis, reason: ExitReason, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        debug_assert!(
            self.state == GlowState::Halted || self.state.can_transition_to(GlowState::Halted),
            "cannot halt from {}",
            self.state
        );
        self.state = GlowState::Halted;
        if self.glow_active {
            self.release_glow(now, sink);
        }
        self.outputs.release_all();
        self.exit = Some((reason, now));
        sink.emit(now, GlowEventKind::Halted(reason));
    }

    /// Summary of the finished cycle, available once `Halted`.
    pub fn report(&self) -> Option<GlowReport> {
        let (exit, exited_at) = self.exit?;
        let plan = self.plan?;
        Some(GlowReport {
            plan,
            policy: self.config.policy,
            exit,
            glow_started_at: self.glow_started_at,
            glow_released_at: self.glow_released_at,
            exited_at,
            heartbeat_toggles: self.heartbeat.toggles(),
        })
    }

    /// Runs a whole cycle: settle, sample, glow under the configured policy,
    /// and halt with every output released.
    ///
    /// Busy-polls `clock` and `crank` until the policy's exit condition holds.
    pub fn run<A, D, C, K, S>(
        &mut self,
        sampler: &mut AnalogSampler<A>,
        delay: &mut D,
        clock: &C,
        crank: &K,
        sink: &mut S,
    ) -> Result<GlowReport, TransitionError>
    where
        A: AnalogInput,
        D: DelayMs + ?Sized,
        C: Clock + ?Sized,
        K: CrankSense + ?Sized,
        S: EventSink + ?Sized,
    {
        sampler.settle(delay);
        self.begin_sampling()?;
        let reading = sampler.collect(delay);

        let mut exit = self.begin(reading, clock.now(), sink)?;
        while exit.is_none() {
            exit = self.poll(clock.now(), crank.is_cranked(), sink);
        }

        self.report()
            .ok_or(TransitionError::new(self.state, GlowState::Halted))
    }

    /// Releases every output and enters the terminal low-power halt.
    pub fn shut_down<H>(mut self, halt: &mut H) -> !
    where
        H: LowPowerHalt + ?Sized,
    {
        self.outputs.release_all();
        halt.enter_low_power_halt()
    }
}
