//! Write a default configuration.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use simchain_chain::ChainConfig;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the configuration
    #[arg(short, long, default_value = "simchain.json")]
    out: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let config = ChainConfig::default();
    write_config(&config, &args.out, args.force)?;

    println!(
        "{}  Saved config to: {}",
        "✓".green().bold(),
        args.out.display().to_string().bright_black()
    );
    println!("    Genesis balance: {}", config.genesis_balance.to_string().bright_cyan());
    println!(
        "    Mempool: {} slots, min fee {}",
        config.mempool.max_size, config.mempool.min_fee
    );
    println!();
    println!("Next steps:");
    println!(
        "  • Use {} to replay a scenario",
        format!("simchain run <scenario.json> --config {}", args.out.display()).bright_cyan()
    );
    println!("  • Use {} for a walkthrough", "simchain demo".bright_cyan());

    Ok(())
}

fn write_config(config: &ChainConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = config.to_json_pretty()?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
