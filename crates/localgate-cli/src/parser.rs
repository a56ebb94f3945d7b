//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface definition for the localgate gateway.
#[derive(Parser)]
#[command(name = "localgate")]
#[command(about = "Serve a local model through an OpenAI-compatible HTTP API")]
#[command(version)]
pub struct Cli {
    /// Override the data directory (settings file location) for this invocation
    #[arg(long = "data-dir", global = true, env = "LOCALGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
