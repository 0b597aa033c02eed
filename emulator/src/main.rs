mod session;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use critical_section as _;
use glow_core::clock::Millis;
use glow_core::config::CancelPolicy;

use session::{Scenario, Session};

const USAGE: &str = "Usage: glow-emulator [--policy <immediate|hold|toggle>] \
[--reading <0-255> | --samples <a,b,...>] [--crank-at <ms>] [--margin <ms>] [--log <path>]";

/// Parsed command line.
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    scenario: Scenario,
    log: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(options.scenario, options.log.as_deref())?;
    let outcome = session.run()?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    for line in outcome.lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()
}

fn parse_options<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (arg.clone(), None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--policy" => {
                let tag = value()?;
                options.scenario.policy = CancelPolicy::from_tag(&tag)
                    .ok_or_else(|| format!("Unknown policy `{tag}`"))?;
            }
            "--reading" => options.scenario.samples = vec![parse_sample(&value()?)?],
            "--samples" => options.scenario.samples = parse_samples(&value()?)?,
            "--crank-at" => options.scenario.crank_at = Some(parse_millis(&value()?)?),
            "--margin" => options.scenario.safety_margin_ms = Some(parse_millis(&value()?)?),
            "--log" => options.log = Some(PathBuf::from(value()?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}

fn parse_sample(text: &str) -> Result<u8, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("Sample `{text}` is not in 0-255"))
}

fn parse_samples(text: &str) -> Result<Vec<u8>, String> {
    let samples = text
        .split(',')
        .map(parse_sample)
        .collect::<Result<Vec<_>, _>>()?;
    if samples.is_empty() {
        return Err("Expected at least one sample".to_string());
    }
    Ok(samples)
}

fn parse_millis(text: &str) -> Result<Millis, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("`{text}` is not a millisecond count"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, String> {
        parse_options(args.iter().map(|arg| (*arg).to_string()))
    }

    #[test]
    fn no_arguments_gives_the_default_scenario() {
        assert_eq!(parse(&[]), Ok(Options::default()));
    }

    #[test]
    fn flags_accept_separate_and_inline_values() {
        let options = parse(&[
            "--policy",
            "toggle",
            "--samples=20,30,40",
            "--crank-at",
            "2500",
            "--log=out/run.log",
        ])
        .expect("valid arguments");

        assert_eq!(options.scenario.policy, CancelPolicy::TimedOutputToggle);
        assert_eq!(options.scenario.samples, vec![20, 30, 40]);
        assert_eq!(options.scenario.crank_at, Some(2_500));
        assert_eq!(options.log, Some(PathBuf::from("out/run.log")));
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(parse(&["--reading", "300"]).is_err());
        assert!(parse(&["--policy", "forever"]).is_err());
        assert!(parse(&["--crank-at"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
