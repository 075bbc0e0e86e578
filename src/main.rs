//! hotdelta - apply and simulate live code-patch batches.

use anyhow::Result;
use clap::{ColorChoice, Parser};

use hotdelta::cli::{Cli, Commands, inspect::inspect_batch, simulate::run_simulation};
use hotdelta::config::AgentConfig;
use hotdelta::logger::set_verbose;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = AgentConfig::load(&cli.config)?;
    set_verbose(cli.verbose || config.log.verbose);

    match &cli.command {
        Commands::Inspect { batch } => inspect_batch(batch),
        Commands::Simulate {
            manifest,
            batch,
            late,
        } => run_simulation(&config, manifest, batch, late),
    }
}
