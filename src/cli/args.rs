//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Live code-patch distribution toolkit
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: hotdelta.toml)
    #[arg(short = 'C', long, global = true, default_value = "hotdelta.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Print debug traces
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Decode a delta batch file and list its deltas
    #[command(visible_alias = "i")]
    Inspect {
        /// JSON batch file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        batch: PathBuf,
    },

    /// Apply a batch to a module set described by a manifest
    #[command(visible_alias = "s")]
    Simulate {
        /// TOML manifest describing modules and handlers
        #[arg(value_hint = clap::ValueHint::FilePath)]
        manifest: PathBuf,

        /// JSON batch file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        batch: PathBuf,

        /// Module to load after the batch (repeatable)
        #[arg(short, long = "late", value_name = "NAME")]
        late: Vec<String>,
    },
}
