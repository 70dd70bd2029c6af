//! Built-in walkthrough: genesis, one transfer, one block.

use super::run::print_outcome;
use crate::scenario::{Step, TransferStep};
use anyhow::Result;
use colored::Colorize;
use simchain_chain::{Blockchain, ChainConfig};

pub fn run() -> Result<()> {
    println!("{}", "Running simchain demo...".bold().cyan());
    println!();

    let mut chain = Blockchain::new(ChainConfig::default());
    chain.generate_genesis()?;
    println!(
        "{}  Created genesis block",
        "✓".green().bold()
    );
    println!(
        "    Fingerprint: {}",
        chain.current_fingerprint().to_hex().bright_yellow()
    );
    println!(
        "    Root balance: {}",
        chain.config().genesis_balance.to_string().bright_cyan()
    );
    println!();

    let steps = [
        Step::Transfer(TransferStep {
            from: "root".to_string(),
            to: None,
            amount: 500,
            fee: 100,
            nonce: 1,
        }),
        Step::Mine,
        // Replaying nonce 1 is refused once it has been applied.
        Step::Transfer(TransferStep {
            from: "root".to_string(),
            to: None,
            amount: 500,
            fee: 100,
            nonce: 1,
        }),
    ];
    for (i, step) in steps.iter().enumerate() {
        let outcome = step.apply(&mut chain)?;
        print_outcome(i + 1, &outcome);
    }

    super::print_summary(&chain);
    Ok(())
}
