//! Inference port consumed by the HTTP gateway.
//!
//! The gateway never touches the model session directly; it goes through
//! this trait so the HTTP layer stays independent of the runtime crate.

use std::fmt;

use async_trait::async_trait;

use super::{ModelError, SnapshotStream};
use crate::domain::{ConversationMessage, ModelCard, ModelState};

/// Port the gateway uses to check availability and run generations.
#[async_trait]
pub trait InferencePort: Send + Sync + fmt::Debug {
    /// Current session state. Never blocks on an in-flight transition.
    fn state(&self) -> ModelState;

    /// Description of the loaded model, or `None` when nothing is loaded.
    async fn model_card(&self) -> Option<ModelCard>;

    /// Generate a response to a conversation.
    ///
    /// Returns the cumulative snapshot stream of the underlying model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotLoaded`] unless the session is loaded.
    async fn generate(
        &self,
        messages: Vec<ConversationMessage>,
    ) -> Result<SnapshotStream, ModelError>;

    /// Compute a sentence embedding for `text`.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f64>, ModelError>;
}
