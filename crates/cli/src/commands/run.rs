//! Replay a scripted scenario.

use crate::scenario::{Scenario, StepOutcome};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use simchain_chain::{Blockchain, ChainConfig};
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Configuration file written by `simchain init`
    #[arg(short, long)]
    config: Option<PathBuf>,
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ChainConfig::from_json_file(path)?,
        None => ChainConfig::default(),
    };
    let scenario = Scenario::from_file(&args.scenario)?;

    let mut chain = Blockchain::new(config);
    scenario.start(&mut chain)?;
    println!(
        "{}  Chain started at height {} ({})",
        "✓".green().bold(),
        chain.height(),
        chain.current_fingerprint().to_hex().bright_yellow()
    );

    for (i, step) in scenario.steps.iter().enumerate() {
        let outcome = step.apply(&mut chain)?;
        print_outcome(i + 1, &outcome);
    }

    super::print_summary(&chain);
    Ok(())
}

pub(crate) fn print_outcome(index: usize, outcome: &StepOutcome) {
    let step = format!("[{}]", index).bright_black();
    match outcome {
        StepOutcome::Submitted { fingerprint, to } => println!(
            "{} {}  Submitted {} to {}",
            step,
            "✓".green().bold(),
            fingerprint.to_hex().bright_yellow(),
            to.to_hex()
        ),
        StepOutcome::Rejected(e) => println!(
            "{} {}  Rejected ({}): {}",
            step,
            "✗".red().bold(),
            e.kind(),
            e
        ),
        StepOutcome::Mined {
            height,
            fingerprint,
            transactions,
        } => println!(
            "{} {}  Block #{} {} ({} txs)",
            step,
            "✓".green().bold(),
            height,
            fingerprint.to_hex().bright_yellow(),
            transactions
        ),
        StepOutcome::Dropped(fingerprint) => println!(
            "{} {}  Dropped {}",
            step,
            "✓".green().bold(),
            fingerprint.to_hex().bright_yellow()
        ),
        StepOutcome::NotPending(fingerprint) => println!(
            "{} {}  {} is not pending",
            step,
            "!".yellow().bold(),
            fingerprint.to_hex()
        ),
    }
}
