//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No HTTP types in any signature
//! - The model runtime is opaque: prompt in, cumulative snapshots out
//! - Side channels (logs, state changes) go through an injected [`EventSink`]

pub mod event_sink;
pub mod inference;
pub mod language_model;
pub mod settings_repository;

use thiserror::Error;

pub use event_sink::{EventSink, NoopSink};
pub use inference::InferencePort;
pub use language_model::{EmbeddingModel, LanguageModel, ModelError, ModelLoader, SnapshotStream};
pub use settings_repository::SettingsRepository;

/// Domain-specific errors for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Storage backend error (filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
