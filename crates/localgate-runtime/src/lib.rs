//! Runtime wiring for localgate.
//!
//! This crate provides the concrete pieces behind the core ports:
//!
//! - [`ModelSession`]: the single shared model, its lifecycle and prompting
//! - [`llama`]: a llama-server backed model, loader and embedder
//! - [`GatewayServer`]: start/stop supervision of the HTTP gateway
//! - [`JsonSettingsRepository`]: settings persisted as JSON
//! - [`monitor`]: periodic CPU and memory sampling
//! - [`sinks`]: event sinks for logs, buffers and subscribers

pub mod gateway;
pub mod llama;
pub mod monitor;
pub mod session;
pub mod settings_store;
pub mod sinks;

pub use gateway::{GatewayConfig, GatewayServer, GatewayStatus, advertised_host};
pub use monitor::{MonitorHandle, SystemMonitor, SystemStats, spawn_monitor};
pub use session::{ModelSession, SessionConfig};
pub use settings_store::JsonSettingsRepository;
pub use sinks::{BroadcastSink, FanoutSink, LogStore, TracingSink};
