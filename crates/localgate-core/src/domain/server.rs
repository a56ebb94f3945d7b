//! Gateway server lifecycle state.

use std::fmt;

use thiserror::Error;

/// Errors that move the gateway server into its error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// Failed to bind the listen socket.
    #[error("Failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// The serving task ended with an error after a successful bind.
    #[error("Server run failed: {0}")]
    Serve(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Lifecycle state of the gateway server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Error(ServerError),
}

impl ServerState {
    #[must_use]
    pub const fn is_starting_or_running(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Stable lowercase label used in events and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Error(e) => write!(f, "Error: {e}"),
        }
    }
}
