//! Top-level subcommands.

use clap::{Args, Subcommand};

use localgate_core::SettingsUpdate;

use crate::config_commands::SettingsCommand;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Load the model and serve the OpenAI-compatible gateway until Ctrl+C
    Serve(ServeArgs),

    /// View or change persisted settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Show the resolved data directory and settings file
    Paths,
}

/// Per-run overrides for `serve`. Nothing here is written back to disk.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Port to listen on (values at or below 1024 fall back to 8080)
    #[arg(short, long, env = "LOCALGATE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "LOCALGATE_HOST")]
    pub host: Option<String>,

    /// Base URL of the llama-server instance
    #[arg(long, env = "LOCALGATE_UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    /// Model identifier advertised on /v1/models
    #[arg(long)]
    pub model_name: Option<String>,

    /// Include conversation history in prompts
    #[arg(long)]
    pub memory_mode: bool,

    /// Model context window in estimated tokens
    #[arg(long)]
    pub context_limit: Option<usize>,

    /// Tokens kept free for the response
    #[arg(long)]
    pub response_reserve: Option<usize>,

    /// Generations allowed to run at once
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Start the gateway without loading the model
    #[arg(long)]
    pub no_load: bool,
}

impl ServeArgs {
    /// Overrides as a settings update, touching only the flags given.
    #[must_use]
    pub fn to_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            server_port: self.port.map(Some),
            bind_host: self.host.clone().map(Some),
            memory_mode: self.memory_mode.then_some(Some(true)),
            context_limit: self.context_limit.map(Some),
            response_reserve: self.response_reserve.map(Some),
            max_concurrent_generations: self.max_concurrent.map(Some),
            upstream_url: self.upstream_url.clone().map(Some),
            model_name: self.model_name.clone().map(Some),
        }
    }
}
