//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use simchain_chain::Blockchain;

mod demo;
mod init;
mod run;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init(init::InitArgs),
    /// Replay a scripted scenario
    Run(run::RunArgs),
    /// Run the built-in walkthrough
    Demo,
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init(args) => init::run(args),
        Commands::Run(args) => run::run(args),
        Commands::Demo => demo::run(),
    }
}

/// Print height, tip, statistics and balances.
pub(crate) fn print_summary(chain: &Blockchain) {
    let stats = chain.stats();

    println!();
    println!("{}", "Chain Summary:".bold().cyan());
    println!();
    println!("  Height:          {}", stats.height.to_string().bright_cyan());
    println!(
        "  Fingerprint:     {}",
        stats.current_fingerprint.to_hex().bright_yellow()
    );
    println!("  Blocks held:     {}", stats.blocks);
    println!("  Pending txs:     {}", stats.pending_transactions);
    println!(
        "  Avg transacted:  {:.2}",
        stats.average_transacted
    );
    if !stats.recent_averages.is_empty() {
        let recent: Vec<String> = stats
            .recent_averages
            .iter()
            .map(|avg| format!("{:.2}", avg))
            .collect();
        println!("  Last blocks avg: {}", recent.join(", ").bright_black());
    }

    println!();
    println!("{}", format!("Accounts ({}):", stats.accounts).bold());
    for (address, account) in chain.accounts() {
        let label = if address.is_root() {
            " (root)".bright_black().to_string()
        } else {
            String::new()
        };
        println!(
            "  {}{}  balance {}  nonce {}  avg spent {:.2}",
            address.to_hex().bright_yellow(),
            label,
            account.balance().to_string().green(),
            account.nonce(),
            account.average_spent()
        );
    }
    println!();
}
