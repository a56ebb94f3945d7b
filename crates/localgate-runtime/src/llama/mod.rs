//! llama.cpp `llama-server` backend.
//!
//! Implements the model capability ports against an already running
//! llama-server: load is a health check, generation streams from
//! `/completion` and embeddings come from `/v1/embeddings`.

mod client;
mod stream;

pub use client::{LlamaEmbeddingModel, LlamaServerConfig, LlamaServerLoader, LlamaServerModel};
