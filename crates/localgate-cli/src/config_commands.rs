//! Settings management subcommands.

use clap::Subcommand;

/// Settings command variants.
#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show all current settings
    Show,
    /// Update persisted settings
    Set {
        /// Gateway port (values at or below 1024 fall back to 8080)
        #[arg(long)]
        port: Option<u16>,
        /// Gateway bind host
        #[arg(long)]
        host: Option<String>,
        /// Include conversation history in prompts (true/false)
        #[arg(long)]
        memory_mode: Option<bool>,
        /// Model context window in estimated tokens
        #[arg(long)]
        context_limit: Option<usize>,
        /// Tokens kept free for the response
        #[arg(long)]
        response_reserve: Option<usize>,
        /// Generations allowed to run at once
        #[arg(long)]
        max_concurrent: Option<usize>,
        /// Base URL of the llama-server instance
        #[arg(long)]
        upstream_url: Option<String>,
        /// Model identifier advertised to clients
        #[arg(long)]
        model_name: Option<String>,
    },
    /// Reset all settings to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}
