//! Command handlers.
//!
//! Handlers follow the pattern `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`:
//! parse CLI-specific input, call into the runtime, format output for the
//! terminal.

pub mod console;
pub mod paths;
pub mod serve;
pub mod settings;
