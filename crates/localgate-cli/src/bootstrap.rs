//! CLI bootstrap: resolves paths and builds the settings repository.
//!
//! Runtime components (model session, gateway) are built by the `serve`
//! handler because only that command needs them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use localgate_core::SettingsRepository;
use localgate_core::paths::{data_root, settings_path_in};
use localgate_runtime::JsonSettingsRepository;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Data directory override from `--data-dir`.
    pub data_dir: Option<PathBuf>,
}

/// Composed context handed to command handlers.
pub struct CliContext {
    /// Directory holding the settings file.
    pub data_dir: PathBuf,
    /// Where settings are persisted.
    pub settings_path: PathBuf,
    /// Settings persistence.
    pub settings: Arc<dyn SettingsRepository>,
}

/// Build the CLI context.
pub fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let data_dir = match config.data_dir {
        Some(dir) => dir,
        None => data_root()?,
    };
    let settings_path = settings_path_in(&data_dir);
    tracing::debug!(path = %settings_path.display(), "Using settings file");

    Ok(CliContext {
        settings: Arc::new(JsonSettingsRepository::new(settings_path.clone())),
        data_dir,
        settings_path,
    })
}
