use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use critical_section as _;
use glow_core::config::CancelPolicy;
use session::{Scenario, Session};

/// Virtual time of the scripted crank in every recorded transcript.
const CRANK_AT_MS: u32 = 8_000;

fn main() -> io::Result<()> {
    for policy in CancelPolicy::ALL {
        record_policy(policy)?;
    }
    Ok(())
}

fn record_policy(policy: CancelPolicy) -> io::Result<()> {
    let path = PathBuf::from("transcripts").join(format!("{}.log", policy.tag()));
    let scenario = Scenario {
        crank_at: Some(CRANK_AT_MS),
        ..Scenario::new(policy)
    };

    let outcome = Session::new(scenario, Some(&path))?.run()?;
    println!(
        "{}: exit={} at {} ms -> {}",
        policy,
        outcome.report.exit,
        outcome.report.exited_at,
        path.display()
    );
    Ok(())
}
