//! Model capability ports.
//!
//! The underlying model runtime is opaque to the gateway: something that
//! accepts a prompt and yields a lazy sequence of **cumulative** snapshots
//! (each item is the whole response so far). These traits are the seam
//! between the session and whatever runtime sits behind it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// A lazy sequence of cumulative text snapshots.
pub type SnapshotStream = BoxStream<'static, Result<String, ModelError>>;

/// Errors raised by the model session and its capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Generation was requested while no model is loaded.
    #[error("Model is not loaded.")]
    NotLoaded,

    /// The runtime rejected the prompt before producing output.
    #[error("Failed to create model input features.")]
    FeatureProvider,

    /// The runtime could not produce a response stream.
    #[error("Failed to process model output.")]
    OutputProcessing,

    /// No embedding capability is configured.
    #[error("The sentence embedding model is unavailable.")]
    EmbeddingModelUnavailable,

    /// The embedding capability returned no vector for the input.
    #[error("Failed to generate embedding for the input text.")]
    EmbeddingGenerationFailed,

    /// The loaded model does not provide this feature.
    #[error("This feature is not supported for custom models.")]
    UnsupportedForCustomModel,

    /// Session configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Model initialization failed.
    #[error("Model load failed: {0}")]
    LoadFailed(String),

    /// The runtime failed while a response was being generated.
    #[error("Generation failed: {0}")]
    Generation(String),
}

impl ModelError {
    /// Returns a suggested HTTP status code for this error.
    #[must_use]
    pub const fn suggested_status_code(&self) -> u16 {
        match self {
            Self::NotLoaded | Self::EmbeddingModelUnavailable => 503,
            Self::EmbeddingGenerationFailed => 422,
            Self::UnsupportedForCustomModel => 501,
            Self::FeatureProvider
            | Self::OutputProcessing
            | Self::InvalidConfiguration(_)
            | Self::LoadFailed(_)
            | Self::Generation(_) => 500,
        }
    }

    /// Stable machine-readable code for HTTP error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotLoaded => "model_not_loaded",
            Self::FeatureProvider => "feature_provider_error",
            Self::OutputProcessing => "output_processing_error",
            Self::EmbeddingModelUnavailable => "embedding_model_unavailable",
            Self::EmbeddingGenerationFailed => "embedding_generation_failed",
            Self::UnsupportedForCustomModel => "unsupported_for_custom_model",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::LoadFailed(_) => "model_load_failed",
            Self::Generation(_) => "generation_failed",
        }
    }
}

/// A loaded language model.
#[async_trait]
pub trait LanguageModel: Send + Sync + fmt::Debug {
    /// Identifier advertised to clients.
    fn model_id(&self) -> &str;

    /// Owner string advertised to clients.
    fn owned_by(&self) -> &str;

    /// Start generating a response to `prompt`.
    ///
    /// Each stream item is the full response so far, not a delta.
    async fn stream_response(&self, prompt: &str) -> Result<SnapshotStream, ModelError>;
}

/// Initializes a [`LanguageModel`].
///
/// Called by the session on a detached task; may be slow.
#[async_trait]
pub trait ModelLoader: Send + Sync + fmt::Debug {
    async fn load(&self) -> Result<Arc<dyn LanguageModel>, ModelError>;
}

/// Sentence embedding capability, independent of the chat model lifecycle.
#[async_trait]
pub trait EmbeddingModel: Send + Sync + fmt::Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ModelError>;
}
