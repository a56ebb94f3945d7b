//! Model session state and model description types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ports::ModelError;

/// Lifecycle state of the model session.
///
/// The error case carries the structured [`ModelError`] so callers can
/// match on the failure kind instead of parsing a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Error(ModelError),
}

impl ModelState {
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Stable lowercase label used in events and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotLoaded => "not_loaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "Not loaded"),
            Self::Loading => write!(f, "Loading"),
            Self::Loaded => write!(f, "Loaded"),
            Self::Error(e) => write!(f, "Error: {e}"),
        }
    }
}

/// Description of the loaded model as advertised on `/v1/models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCard {
    /// Model identifier clients pass back in the `model` field.
    pub id: String,
    /// Owner string reported to OpenAI clients.
    pub owned_by: String,
    /// When the model finished loading.
    pub loaded_at: DateTime<Utc>,
}

impl ModelCard {
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owned_by: owned_by.into(),
            loaded_at: Utc::now(),
        }
    }

    /// Load time as unix seconds (the OpenAI `created` field).
    #[must_use]
    pub fn created(&self) -> i64 {
        self.loaded_at.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_not_loaded() {
        assert_eq!(ModelState::default(), ModelState::NotLoaded);
        assert!(!ModelState::default().is_loaded());
    }

    #[test]
    fn test_error_state_display_includes_cause() {
        let state = ModelState::Error(ModelError::LoadFailed("no weights".into()));
        assert!(state.is_error());
        assert_eq!(state.label(), "error");
        assert!(state.to_string().contains("no weights"));
    }
}
