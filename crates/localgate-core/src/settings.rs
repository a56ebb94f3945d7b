//! Settings domain types and validation.
//!
//! These are the persisted user preferences plus the per-deployment tuning
//! knobs of the gateway. All fields are optional so partial files and
//! partial updates work; `effective_*` accessors apply the defaults.

use serde::{Deserialize, Serialize};

use crate::budget::{DEFAULT_CONTEXT_LIMIT, DEFAULT_RESPONSE_RESERVE, PromptBudget, PromptMode};

/// Default listen port for the gateway.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default listen host for the gateway (all interfaces).
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default base URL of the llama-server backing the session.
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8081";

/// Default model identifier advertised on `/v1/models`.
pub const DEFAULT_MODEL_NAME: &str = "local-model";

/// Ports at or below this value are replaced by the fallback port.
const PRIVILEGED_PORT_CEILING: u16 = 1024;

/// Resolve the listen port: anything not above 1024 is replaced by `fallback`.
#[must_use]
pub const fn resolve_server_port(configured: Option<u16>, fallback: u16) -> u16 {
    match configured {
        Some(port) if port > PRIVILEGED_PORT_CEILING => port,
        _ => fallback,
    }
}

/// Application settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Listen port for the OpenAI-compatible gateway.
    pub server_port: Option<u16>,

    /// Listen host for the gateway.
    pub bind_host: Option<String>,

    /// Multi-turn prompting ("memory mode").
    pub memory_mode: Option<bool>,

    /// Model context window in estimated tokens.
    pub context_limit: Option<usize>,

    /// Tokens kept free for the response.
    pub response_reserve: Option<usize>,

    /// Generations allowed to run against the model at once.
    pub max_concurrent_generations: Option<usize>,

    /// Base URL of the llama-server instance.
    pub upstream_url: Option<String>,

    /// Model identifier advertised to clients.
    pub model_name: Option<String>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            server_port: Some(DEFAULT_SERVER_PORT),
            bind_host: Some(DEFAULT_BIND_HOST.to_string()),
            memory_mode: Some(false),
            context_limit: Some(DEFAULT_CONTEXT_LIMIT),
            response_reserve: Some(DEFAULT_RESPONSE_RESERVE),
            max_concurrent_generations: Some(1),
            upstream_url: Some(DEFAULT_UPSTREAM_URL.to_string()),
            model_name: Some(DEFAULT_MODEL_NAME.to_string()),
        }
    }

    /// Listen port after substituting the default for unusable values.
    #[must_use]
    pub const fn effective_server_port(&self) -> u16 {
        resolve_server_port(self.server_port, DEFAULT_SERVER_PORT)
    }

    #[must_use]
    pub fn effective_bind_host(&self) -> &str {
        self.bind_host.as_deref().unwrap_or(DEFAULT_BIND_HOST)
    }

    #[must_use]
    pub fn effective_prompt_mode(&self) -> PromptMode {
        PromptMode::from_memory_mode(self.memory_mode.unwrap_or(false))
    }

    #[must_use]
    pub fn effective_max_concurrent_generations(&self) -> usize {
        self.max_concurrent_generations.unwrap_or(1)
    }

    #[must_use]
    pub fn effective_upstream_url(&self) -> &str {
        self.upstream_url.as_deref().unwrap_or(DEFAULT_UPSTREAM_URL)
    }

    #[must_use]
    pub fn effective_model_name(&self) -> &str {
        self.model_name.as_deref().unwrap_or(DEFAULT_MODEL_NAME)
    }

    /// Prompt budget derived from the context settings.
    pub fn effective_budget(&self) -> Result<PromptBudget, SettingsError> {
        let context_limit = self.context_limit.unwrap_or(DEFAULT_CONTEXT_LIMIT);
        let response_reserve = self.response_reserve.unwrap_or(DEFAULT_RESPONSE_RESERVE);
        PromptBudget::new(context_limit, response_reserve).map_err(|_| SettingsError::InvalidBudget {
            context_limit,
            response_reserve,
        })
    }

    /// Merge another settings into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(port) = other.server_port {
            self.server_port = port;
        }
        if let Some(ref host) = other.bind_host {
            self.bind_host.clone_from(host);
        }
        if let Some(mode) = other.memory_mode {
            self.memory_mode = mode;
        }
        if let Some(limit) = other.context_limit {
            self.context_limit = limit;
        }
        if let Some(reserve) = other.response_reserve {
            self.response_reserve = reserve;
        }
        if let Some(max) = other.max_concurrent_generations {
            self.max_concurrent_generations = max;
        }
        if let Some(ref url) = other.upstream_url {
            self.upstream_url.clone_from(url);
        }
        if let Some(ref name) = other.model_name {
            self.model_name.clone_from(name);
        }
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = set field to None/null
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub server_port: Option<Option<u16>>,
    pub bind_host: Option<Option<String>>,
    pub memory_mode: Option<Option<bool>>,
    pub context_limit: Option<Option<usize>>,
    pub response_reserve: Option<Option<usize>>,
    pub max_concurrent_generations: Option<Option<usize>>,
    pub upstream_url: Option<Option<String>>,
    pub model_name: Option<Option<String>>,
}

impl SettingsUpdate {
    /// True when the update would not change anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.server_port.is_none()
            && self.bind_host.is_none()
            && self.memory_mode.is_none()
            && self.context_limit.is_none()
            && self.response_reserve.is_none()
            && self.max_concurrent_generations.is_none()
            && self.upstream_url.is_none()
            && self.model_name.is_none()
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error(
        "Response reserve ({response_reserve}) must be smaller than the context limit ({context_limit})"
    )]
    InvalidBudget {
        context_limit: usize,
        response_reserve: usize,
    },

    #[error("At least one concurrent generation must be allowed")]
    InvalidConcurrency,

    #[error("Upstream URL cannot be empty")]
    EmptyUpstreamUrl,

    #[error("Bind host cannot be empty")]
    EmptyBindHost,
}

/// Validate settings values.
///
/// Ports at or below 1024 are not rejected; they are replaced by the
/// default when the gateway starts.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    settings.effective_budget()?;

    if settings.max_concurrent_generations == Some(0) {
        return Err(SettingsError::InvalidConcurrency);
    }

    if settings
        .upstream_url
        .as_ref()
        .is_some_and(|u| u.trim().is_empty())
    {
        return Err(SettingsError::EmptyUpstreamUrl);
    }

    if settings
        .bind_host
        .as_ref()
        .is_some_and(|h| h.trim().is_empty())
    {
        return Err(SettingsError::EmptyBindHost);
    }

    Ok(())
}
