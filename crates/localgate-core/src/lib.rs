//! Core domain for the localgate inference gateway.
//!
//! This crate holds everything that is independent of HTTP and of the
//! concrete model runtime: conversation and state types, the port traits
//! adapters implement, the context budgeter and the cumulative-to-delta
//! stream adapter.

#![deny(unused_crate_dependencies)]

pub mod budget;
pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod settings;
pub mod streaming;

// Re-export commonly used types for convenience
pub use budget::{
    BuiltPrompt, CharCountEstimator, DEFAULT_CONTEXT_LIMIT, DEFAULT_RESPONSE_RESERVE, PromptBudget,
    PromptMode, TokenEstimator, build_prompt,
};
pub use domain::{
    ConversationMessage, MessageRole, ModelCard, ModelState, ServerError, ServerState,
};
pub use events::GatewayEvent;
pub use ports::{
    EmbeddingModel, EventSink, InferencePort, LanguageModel, ModelError, ModelLoader,
    NoopSink, RepositoryError, SettingsRepository, SnapshotStream,
};
pub use paths::{PathError, data_root, settings_path};
pub use settings::{
    DEFAULT_BIND_HOST, DEFAULT_MODEL_NAME, DEFAULT_SERVER_PORT, DEFAULT_UPSTREAM_URL, Settings,
    SettingsError, SettingsUpdate, resolve_server_port, validate_settings,
};
pub use streaming::into_deltas;
