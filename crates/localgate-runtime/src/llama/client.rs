//! HTTP client for a running llama.cpp `llama-server`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use localgate_core::{
    EmbeddingModel, LanguageModel, ModelError, ModelLoader, Settings, SnapshotStream,
};

use super::stream::cumulative_snapshots;

/// Owner string advertised for llama-server backed models.
const OWNED_BY: &str = "llama.cpp";

/// Connection settings for a llama-server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlamaServerConfig {
    /// Base URL, e.g. `http://127.0.0.1:8081`.
    pub base_url: String,
    /// Model identifier advertised to clients.
    pub model_name: String,
    /// Timeout for the health check performed on load.
    pub health_timeout: Duration,
}

impl LlamaServerConfig {
    pub fn new(base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model_name: model_name.into(),
            health_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.effective_upstream_url(),
            settings.effective_model_name(),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn build_client() -> Result<Client, ModelError> {
    Client::builder()
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| ModelError::InvalidConfiguration(format!("HTTP client: {e}")))
}

/// Loads a [`LlamaServerModel`] once the server answers its health check.
#[derive(Debug, Clone)]
pub struct LlamaServerLoader {
    config: LlamaServerConfig,
    client: Client,
}

impl LlamaServerLoader {
    pub fn new(config: LlamaServerConfig) -> Result<Self, ModelError> {
        Ok(Self {
            config,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl ModelLoader for LlamaServerLoader {
    async fn load(&self) -> Result<Arc<dyn LanguageModel>, ModelError> {
        let url = self.config.endpoint("health");
        info!("Checking llama-server at {url}");

        let response = self
            .client
            .get(&url)
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|e| ModelError::LoadFailed(format!("cannot reach llama-server at {url}: {e}")))?;

        match response.status() {
            status if status.is_success() => {
                info!(model = %self.config.model_name, "llama-server is ready");
                Ok(Arc::new(LlamaServerModel {
                    config: self.config.clone(),
                    client: self.client.clone(),
                }))
            }
            StatusCode::SERVICE_UNAVAILABLE => Err(ModelError::LoadFailed(
                "llama-server is still loading its model".to_string(),
            )),
            status => Err(ModelError::LoadFailed(format!(
                "llama-server health check returned {status}"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    stream: bool,
}

/// A model served by llama-server's native `/completion` endpoint.
#[derive(Debug, Clone)]
pub struct LlamaServerModel {
    config: LlamaServerConfig,
    client: Client,
}

#[async_trait]
impl LanguageModel for LlamaServerModel {
    fn model_id(&self) -> &str {
        &self.config.model_name
    }

    fn owned_by(&self) -> &str {
        OWNED_BY
    }

    async fn stream_response(&self, prompt: &str) -> Result<SnapshotStream, ModelError> {
        let url = self.config.endpoint("completion");
        debug!(prompt_chars = prompt.chars().count(), "POST {url}");

        let response = self
            .client
            .post(&url)
            .json(&CompletionRequest {
                prompt,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| ModelError::Generation(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                Ok(cumulative_snapshots(response.bytes_stream()).boxed())
            }
            StatusCode::BAD_REQUEST => {
                warn!("llama-server rejected the prompt");
                Err(ModelError::FeatureProvider)
            }
            status => Err(ModelError::Generation(format!(
                "llama-server returned {status}"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsItem {
    embedding: Vec<f64>,
}

/// Sentence embeddings from llama-server's `/v1/embeddings` endpoint.
///
/// The server must be started with embeddings enabled; otherwise it
/// answers 501 and the request fails with
/// [`ModelError::UnsupportedForCustomModel`].
#[derive(Debug, Clone)]
pub struct LlamaEmbeddingModel {
    config: LlamaServerConfig,
    client: Client,
}

impl LlamaEmbeddingModel {
    pub fn new(config: LlamaServerConfig) -> Result<Self, ModelError> {
        Ok(Self {
            config,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl EmbeddingModel for LlamaEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ModelError> {
        let url = self.config.endpoint("v1/embeddings");
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingsRequest {
                model: &self.config.model_name,
                input: text,
            })
            .send()
            .await
            .map_err(|e| {
                warn!("Embedding request failed: {e}");
                ModelError::EmbeddingModelUnavailable
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => {
                return Err(ModelError::UnsupportedForCustomModel);
            }
            status => {
                warn!("llama-server embeddings returned {status}");
                return Err(ModelError::EmbeddingGenerationFailed);
            }
        }

        let body: EmbeddingsResponse = response.json().await.map_err(|e| {
            warn!("Invalid embeddings response: {e}");
            ModelError::EmbeddingGenerationFailed
        })?;

        body.data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|v| !v.is_empty())
            .ok_or(ModelError::EmbeddingGenerationFailed)
    }
}
