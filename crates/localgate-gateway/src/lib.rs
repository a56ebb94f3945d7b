//! OpenAI-compatible HTTP gateway in front of a local model session.
//!
//! The gateway only talks to the model through
//! [`InferencePort`](localgate_core::InferencePort); lifecycle (bind, stop,
//! state reporting) is handled by the supervisor in `localgate-runtime`.

#![deny(unsafe_code)]

pub mod models;
pub mod server;
pub mod sse;

pub use server::{HEALTH_MESSAGE, MAX_BODY_BYTES, create_router, serve};
