//! Axum HTTP server for the OpenAI-compatible gateway.
//!
//! This module provides the `serve()` function that runs the gateway using a
//! pre-bound `TcpListener` (from the supervisor), and `create_router()` for
//! in-process use and tests.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures_util::TryStreamExt;
use localgate_core::{ConversationMessage, InferencePort, ModelError, SnapshotStream, into_deltas};
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::models::{
    ChatCompletionRequest, ChatCompletionResponse, CompletionRequest, CompletionResponse,
    EmbeddingData, EmbeddingRequest, EmbeddingResponse, ErrorResponse, ModelsResponse, StreamMeta,
};
use crate::sse::stream_chat_completion;

/// Liveness text served on `/health`.
pub const HEALTH_MESSAGE: &str = "Server is running.";

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 500 * 1024;

/// Reason returned with 503 when generation is requested without a model.
pub const MODEL_NOT_LOADED_REASON: &str = "AI model is not loaded.";

/// Seconds clients are asked to wait while the model is loading.
const RETRY_AFTER_SECS: &str = "5";

/// Shared application state for the gateway.
#[derive(Clone)]
struct AppState {
    /// Port to the model session.
    inference: Arc<dyn InferencePort>,
}

/// Build the gateway router.
pub fn create_router(inference: Arc<dyn InferencePort>) -> Router {
    let state = AppState { inference };

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/embeddings", post(embeddings))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway with a pre-bound listener.
///
/// Runs until the cancellation token is triggered. In-flight streams are
/// allowed to finish during graceful shutdown.
///
/// # Returns
///
/// Returns `Ok(())` on clean shutdown, or an error if the server fails.
pub async fn serve(
    listener: TcpListener,
    inference: Arc<dyn InferencePort>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Gateway listening on {addr}");
    info!("Configure OpenAI clients to use: http://{addr}/v1");

    let app = create_router(inference);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Gateway shut down");
    Ok(())
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    HEALTH_MESSAGE
}

/// List the loaded model in OpenAI format (empty when nothing is loaded).
async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    debug!("GET /v1/models");
    let card = state.inference.model_card().await;
    Json(ModelsResponse::from_card(card.as_ref()))
}

/// Handle chat completions, streaming or not.
async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("POST /v1/chat/completions");

    if let Some(response) = unavailable_response(state.inference.as_ref()) {
        return response;
    }

    let request: ChatCompletionRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    info!(
        model = %request.model,
        streaming = %request.is_streaming(),
        messages = request.messages.len(),
        "Processing chat completion request"
    );

    let snapshots = match state.inference.generate(request.conversation()).await {
        Ok(stream) => stream,
        Err(e) => return generation_error_response(state.inference.as_ref(), &e),
    };

    if request.is_streaming() {
        return stream_chat_completion(snapshots, StreamMeta::new(request.model));
    }

    match collect_text(snapshots).await {
        Ok(text) => {
            let prompt_chars = request.prompt_chars();
            Json(ChatCompletionResponse::new(request.model, text, prompt_chars)).into_response()
        }
        Err(e) => generation_error_response(state.inference.as_ref(), &e),
    }
}

/// Handle legacy completions: the prompt becomes a single user message.
async fn completions(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("POST /v1/completions");

    if let Some(response) = unavailable_response(state.inference.as_ref()) {
        return response;
    }

    let request: CompletionRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let messages = vec![ConversationMessage::user(request.prompt.clone())];
    let result = match state.inference.generate(messages).await {
        Ok(snapshots) => collect_text(snapshots).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(text) => Json(CompletionResponse::new(request.model, &request.prompt, text))
            .into_response(),
        Err(e) => generation_error_response(state.inference.as_ref(), &e),
    }
}

/// Compute embeddings. Does not depend on the chat model state.
async fn embeddings(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("POST /v1/embeddings");

    let request: EmbeddingRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let texts = request.input.texts();
    if texts.is_empty() {
        debug!("Rejecting embedding request without input");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::invalid_request("input must not be empty")),
        )
            .into_response();
    }
    let mut data = Vec::with_capacity(texts.len());
    let mut input_chars = 0;
    for (index, text) in texts.into_iter().enumerate() {
        match state.inference.generate_embedding(text).await {
            Ok(vector) => data.push(EmbeddingData::new(index, vector)),
            Err(e) => return model_error_response(&e),
        }
        input_chars += text.chars().count();
    }

    Json(EmbeddingResponse::new(request.model, data, input_chars)).into_response()
}

/// Concatenate the deltas of a snapshot stream into the full response.
async fn collect_text(snapshots: SnapshotStream) -> Result<String, ModelError> {
    into_deltas(snapshots)
        .try_fold(String::new(), |mut text, delta| async move {
            text.push_str(&delta);
            Ok::<_, ModelError>(text)
        })
        .await
}

/// 503 unless the session can serve generations right now.
fn unavailable_response(inference: &dyn InferencePort) -> Option<Response> {
    let state = inference.state();
    if state.is_loaded() {
        return None;
    }
    warn!(state = %state, "Rejecting generation request: model not loaded");
    let body = ErrorResponse::with_code(
        MODEL_NOT_LOADED_REASON,
        "service_unavailable",
        ModelError::NotLoaded.code(),
    );
    Some(with_retry_hint(
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response(),
        state.is_loading(),
    ))
}

/// Error response for the generation endpoints, which depend on the chat model.
fn generation_error_response(inference: &dyn InferencePort, err: &ModelError) -> Response {
    with_retry_hint(model_error_response(err), inference.state().is_loading())
}

/// Convert a `ModelError` to an HTTP response with the suggested status code.
fn model_error_response(err: &ModelError) -> Response {
    let status = StatusCode::from_u16(err.suggested_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("Request failed: {err}");
    } else {
        debug!("Request rejected: {err}");
    }
    (status, Json(ErrorResponse::from(err))).into_response()
}

/// Add `retry-after` to 503 responses while a load is in progress.
fn with_retry_hint(mut response: Response, loading: bool) -> Response {
    if loading
        && response.status() == StatusCode::SERVICE_UNAVAILABLE
        && let Ok(value) = RETRY_AFTER_SECS.parse()
    {
        response.headers_mut().insert("retry-after", value);
    }
    response
}

/// Decode a JSON body, mapping failures to a 400 response.
#[allow(clippy::result_large_err)]
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        error!("Failed to parse request: {e}");
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::invalid_request(e))).into_response()
    })
}
