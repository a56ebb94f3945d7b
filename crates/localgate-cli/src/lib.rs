//! Command-line front end for localgate.
//!
//! `main.rs` is the composition root; this library holds the argument
//! definitions and the command handlers so they can be tested.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary target.
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod config_commands;
pub mod handlers;
pub mod parser;
pub mod utils;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, ServeArgs};
pub use config_commands::SettingsCommand;
pub use parser::Cli;
