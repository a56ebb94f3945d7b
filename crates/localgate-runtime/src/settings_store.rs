//! JSON file implementation of the settings repository.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use localgate_core::paths::{PathError, settings_path};
use localgate_core::{RepositoryError, Settings, SettingsRepository};

/// Stores settings as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonSettingsRepository {
    path: PathBuf,
}

impl JsonSettingsRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository at `<data_root>/settings.json`.
    pub fn at_default_location() -> Result<Self, PathError> {
        Ok(Self::new(settings_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsRepository for JsonSettingsRepository {
    async fn load(&self) -> Result<Settings, RepositoryError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(Settings::with_defaults());
            }
            Err(e) => {
                return Err(RepositoryError::Storage(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&raw)
            .map_err(|e| RepositoryError::Serialization(format!("{}: {e}", self.path.display())))
    }

    async fn save(&self, settings: &Settings) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RepositoryError::Storage(format!("{}: {e}", parent.display())))?;
        }

        let json = serde_json::to_vec_pretty(settings)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| RepositoryError::Storage(format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}
