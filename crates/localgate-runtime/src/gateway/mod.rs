//! Gateway supervision.
//!
//! The HTTP server itself lives in `localgate-gateway`; this module owns
//! its lifecycle (bind, run, stop) and reports state changes.

mod address;
pub mod supervisor;

pub use address::advertised_host;
pub use supervisor::{GatewayConfig, GatewayServer, GatewayStatus, STOP_TIMEOUT};
