//! Canonical event union for operator-visible gateway events.
//!
//! Emitted through an [`EventSink`](crate::ports::EventSink) by the model
//! session and the gateway server. Serialized with a `type` tag:
//!
//! ```json
//! { "type": "server_state_changed", "state": "running", "address": "http://192.168.1.4:8080" }
//! ```

use serde::Serialize;

use crate::domain::{ModelState, ServerState};

/// Event types emitted by the gateway components.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The model session moved to a new state.
    ModelStateChanged {
        /// Stable state label (`not_loaded`, `loading`, `loaded`, `error`).
        state: String,
        /// Error description when `state` is `error`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The gateway server moved to a new state.
    ServerStateChanged {
        /// Stable state label (`stopped`, `starting`, `running`, `error`).
        state: String,
        /// Externally reachable address while running.
        #[serde(skip_serializing_if = "Option::is_none")]
        address: Option<String>,
        /// Error description when `state` is `error`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Periodic resource usage sample.
    SystemStats {
        /// System-wide CPU usage, 0 to 100.
        cpu_percent: f32,
        /// Resident memory of the gateway process.
        memory_bytes: u64,
    },

    /// A free-form log line for the operator.
    Log {
        /// Log message.
        message: String,
    },
}

impl GatewayEvent {
    /// Create a model state change event.
    pub fn model_state(state: &ModelState) -> Self {
        let error = match state {
            ModelState::Error(e) => Some(e.to_string()),
            _ => None,
        };
        Self::ModelStateChanged {
            state: state.label().to_string(),
            error,
        }
    }

    /// Create a server state change event.
    pub fn server_state(state: &ServerState, address: Option<&str>) -> Self {
        let error = match state {
            ServerState::Error(e) => Some(e.to_string()),
            _ => None,
        };
        Self::ServerStateChanged {
            state: state.label().to_string(),
            address: address.map(str::to_string),
            error,
        }
    }

    /// Create a resource usage event.
    pub const fn system_stats(cpu_percent: f32, memory_bytes: u64) -> Self {
        Self::SystemStats {
            cpu_percent,
            memory_bytes,
        }
    }

    /// Create a log event.
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    /// One-line human readable rendering, used by log sinks.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ModelStateChanged { state, error: None } => format!("Model state: {state}"),
            Self::ModelStateChanged {
                state,
                error: Some(e),
            } => format!("Model state: {state} ({e})"),
            Self::ServerStateChanged {
                state,
                address,
                error,
            } => {
                let mut line = format!("Server state: {state}");
                if let Some(addr) = address {
                    line.push_str(&format!(" at {addr}"));
                }
                if let Some(e) = error {
                    line.push_str(&format!(" ({e})"));
                }
                line
            }
            Self::SystemStats {
                cpu_percent,
                memory_bytes,
            } => format!(
                "CPU {cpu_percent:.1}%, memory {}",
                format_bytes(*memory_bytes)
            ),
            Self::Log { message } => message.clone(),
        }
    }
}

/// Render a byte count with a binary unit, e.g. `312.4 MiB`.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
