use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use glow_core::clock::{Millis, MillisCounter, TickTimerConfig};
use glow_core::config::{CancelPolicy, GlowConfig};
use glow_core::crank::CrankLatch;
use glow_core::machine::{GlowController, GlowReport, configure_interrupts};
use glow_core::sampler::AnalogSampler;
use glow_core::sim::{
    RecordingInterrupts, RecordingOutputs, ScriptedAdc, ScriptedCrank, TickDelay, TickingClock,
};
use glow_core::telemetry::{EventSink, GlowEventKind};

/// Core clock the simulated board pretends to run at.
pub const SIM_CORE_CLOCK_HZ: u32 = 16_000_000;

/// Reading used when no samples are given: three seconds on the stock table.
pub const DEFAULT_READING: u8 = 90;

/// Inputs for one simulated power-up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Scenario {
    pub policy: CancelPolicy,
    /// Converter results, cycled if shorter than the sample count.
    pub samples: Vec<u8>,
    pub crank_at: Option<Millis>,
    pub safety_margin_ms: Option<Millis>,
}

impl Scenario {
    pub fn new(policy: CancelPolicy) -> Self {
        Self {
            policy,
            samples: vec![DEFAULT_READING],
            crank_at: None,
            safety_margin_ms: None,
        }
    }

    pub fn config(&self) -> GlowConfig {
        let config = GlowConfig::DEFAULT.with_policy(self.policy);
        match self.safety_margin_ms {
            Some(margin) => config.with_safety_margin(margin),
            None => config,
        }
    }

    pub fn header(&self) -> String {
        format!("Glow timer emulator {} transcript", self.policy)
    }

    fn describe(&self) -> String {
        let mut line = format!("power-up policy={} samples=", self.policy);
        for (index, sample) in self.samples.iter().enumerate() {
            if index > 0 {
                line.push(',');
            }
            let _ = write!(line, "{sample}");
        }
        match self.crank_at {
            Some(at) => {
                let _ = write!(line, " crank-at={at}ms");
            }
            None => line.push_str(" crank-at=never"),
        }
        if let Some(margin) = self.safety_margin_ms {
            let _ = write!(line, " margin={margin}ms");
        }
        line
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new(CancelPolicy::default())
    }
}

/// Result of a simulated cycle.
#[derive(Debug)]
pub struct SessionOutcome {
    pub report: GlowReport,
    pub lines: Vec<String>,
}

pub struct Session {
    scenario: Scenario,
    transcript: TranscriptLogger,
}

impl Session {
    /// Prepares a session, truncating `log_path` if one is given.
    pub fn new(scenario: Scenario, log_path: Option<&Path>) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(log_path, &scenario.header())?;
        Ok(Self {
            scenario,
            transcript,
        })
    }

    /// Runs one power-up to halt in virtual time and returns the transcript.
    pub fn run(&mut self) -> io::Result<SessionOutcome> {
        let config = self.scenario.config();
        config
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        let millis = MillisCounter::new();
        let latch = CrankLatch::new();
        let mut delay = TickDelay::new(&millis);
        let clock = TickingClock::new(&millis);
        let crank = ScriptedCrank::new(&millis, &latch, self.scenario.crank_at);
        let mut sampler =
            AnalogSampler::new(ScriptedAdc::new(&self.scenario.samples), config.sampler);

        let timer = TickTimerConfig::for_millis(SIM_CORE_CLOCK_HZ, 1, 0);
        let mut irq = RecordingInterrupts::new();
        configure_interrupts(&mut irq, &timer, &config);

        let mut trace = EventTrace::default();
        let mut controller = GlowController::new(config, RecordingOutputs::new());
        let report = controller
            .run(&mut sampler, &mut delay, &clock, &crank, &mut trace)
            .map_err(|err| io::Error::other(err.to_string()))?;

        let mut lines = Vec::with_capacity(trace.events.len() + 3);
        lines.push(self.transcript.append_line(
            0,
            TranscriptRole::Host,
            &self.scenario.describe(),
        )?);
        let setup = format!(
            "systick reload={} crank-edge={:?}",
            timer.compare, config.crank_polarity
        );
        lines.push(
            self.transcript
                .append_line(0, TranscriptRole::Emulator, &setup)?,
        );
        for (timestamp, event) in trace.events {
            let line = event.to_string();
            lines.push(
                self.transcript
                    .append_line(timestamp, TranscriptRole::Emulator, &line)?,
            );
        }
        lines.push(self.transcript.append_line(
            report.exited_at,
            TranscriptRole::Emulator,
            &describe_report(&report),
        )?);
        self.transcript.flush()?;

        Ok(SessionOutcome { report, lines })
    }
}

/// Collects events in emission order.
#[derive(Debug, Default)]
struct EventTrace {
    events: Vec<(Millis, GlowEventKind)>,
}

impl EventSink for EventTrace {
    fn emit(&mut self, timestamp: Millis, event: GlowEventKind) {
        self.events.push((timestamp, event));
    }
}

fn describe_report(report: &GlowReport) -> String {
    let released = report
        .glow_released_at
        .map_or_else(|| "never".to_string(), |at| format!("{at}ms"));
    format!(
        "summary reading={} duration={}ms deadline={}ms exit={} glow-released={} toggles={}",
        report.plan.reading.value(),
        report.plan.glow_duration_ms,
        report.plan.safety_deadline_ms,
        report.exit,
        released,
        report.heartbeat_toggles
    )
}

struct TranscriptLogger {
    writer: Option<BufWriter<std::fs::File>>,
}

impl TranscriptLogger {
    fn new(path: Option<&Path>, header: &str) -> io::Result<Self> {
        let Some(path) = path else {
            return Ok(Self { writer: None });
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: Some(BufWriter::new(file)),
        };

        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "# {header}")?;
            writeln!(writer, "# Timestamps are virtual milliseconds since power-up")?;
            writeln!(writer)?;
        }
        Ok(())
    }

    fn append_line(&mut self, at: Millis, role: TranscriptRole, line: &str) -> io::Result<String> {
        let formatted = format!("[+{at:>6} ms] {} {line}", role.prefix());
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{formatted}")?;
        }
        Ok(formatted)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glow_core::machine::ExitReason;

    fn run(scenario: Scenario) -> SessionOutcome {
        Session::new(scenario, None)
            .expect("session without log file")
            .run()
            .expect("simulated cycle")
    }

    #[test]
    fn default_scenario_glows_for_three_seconds() {
        let outcome = run(Scenario::default());

        assert_eq!(outcome.report.plan.glow_duration_ms, 3_000);
        assert_eq!(outcome.report.exit, ExitReason::DurationElapsed);
        assert_eq!(
            outcome.lines.first().map(String::as_str),
            Some("[+     0 ms] HOST> power-up policy=immediate samples=90 crank-at=never")
        );
        assert!(
            outcome
                .lines
                .iter()
                .any(|line| line == "[+   110 ms] EMU < glow-asserted")
        );
    }

    #[test]
    fn hold_scenario_ends_on_crank() {
        let scenario = Scenario {
            crank_at: Some(4_000),
            ..Scenario::new(CancelPolicy::SafetyMarginHold)
        };
        let outcome = run(scenario);

        assert_eq!(outcome.report.exit, ExitReason::Cranked);
        let last = outcome.lines.last().expect("summary line");
        assert!(last.contains("exit=cranked"), "{last}");
    }

    #[test]
    fn invalid_margin_is_rejected() {
        let scenario = Scenario {
            safety_margin_ms: Some(u32::MAX),
            ..Scenario::new(CancelPolicy::SafetyMarginHold)
        };
        let err = Session::new(scenario, None)
            .expect("session without log file")
            .run()
            .expect_err("overflowing margin");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn transcript_file_gets_header_and_lines() {
        let dir = std::env::temp_dir().join(format!("glow-emulator-{}", std::process::id()));
        let path = dir.join("toggle.log");
        let scenario = Scenario {
            crank_at: Some(5_000),
            ..Scenario::new(CancelPolicy::TimedOutputToggle)
        };

        let outcome = Session::new(scenario, Some(&path))
            .expect("log file opens")
            .run()
            .expect("simulated cycle");
        let written = fs::read_to_string(&path).expect("transcript written");
        let _ = fs::remove_dir_all(&dir);

        assert!(written.starts_with("# Glow timer emulator toggle transcript\n"));
        for line in &outcome.lines {
            assert!(written.contains(line.as_str()), "missing {line}");
        }
    }
}
