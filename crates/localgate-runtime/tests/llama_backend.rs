//! End-to-end tests against a mock llama-server.
//!
//! The mock speaks just enough of llama-server's HTTP API: `/health`,
//! streaming `/completion` and `/v1/embeddings`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use localgate_core::{
    ConversationMessage, LanguageModel, ModelError, ModelLoader, ModelState, NoopSink,
};
use localgate_runtime::llama::{LlamaEmbeddingModel, LlamaServerConfig, LlamaServerLoader};
use localgate_runtime::{GatewayConfig, GatewayServer, ModelSession, SessionConfig};

struct MockLlama {
    healthy: AtomicBool,
    embeddings_enabled: AtomicBool,
    prompts: Mutex<Vec<String>>,
}

impl MockLlama {
    fn new(healthy: bool, embeddings_enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(healthy),
            embeddings_enabled: AtomicBool::new(embeddings_enabled),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

async fn health(State(mock): State<Arc<MockLlama>>) -> StatusCode {
    if mock.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn completion(State(mock): State<Arc<MockLlama>>, Json(body): Json<Value>) -> Response {
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    mock.prompts.lock().unwrap().push(prompt.clone());

    if prompt.contains("reject me") {
        return (StatusCode::BAD_REQUEST, "bad prompt").into_response();
    }

    let mut events = String::new();
    for piece in ["Hel", "lo"] {
        events.push_str(&format!("data: {}\n\n", json!({ "content": piece, "stop": false })));
    }
    events.push_str(&format!("data: {}\n\n", json!({ "content": "", "stop": true })));

    ([(header::CONTENT_TYPE, "text/event-stream")], events).into_response()
}

async fn embeddings(State(mock): State<Arc<MockLlama>>, Json(_body): Json<Value>) -> Response {
    if mock.embeddings_enabled.load(Ordering::SeqCst) {
        Json(json!({ "data": [{ "embedding": [0.25, 0.5, 0.75] }] })).into_response()
    } else {
        StatusCode::NOT_IMPLEMENTED.into_response()
    }
}

/// Serve the mock on a random local port and return its base URL.
async fn spawn_mock(mock: Arc<MockLlama>) -> String {
    let app = Router::new()
        .route("/health", get(health))
        .route("/completion", post(completion))
        .route("/v1/embeddings", post(embeddings))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn loaded_session(base_url: &str) -> ModelSession {
    let config = LlamaServerConfig::new(base_url, "test-model");
    let session = ModelSession::new(
        Arc::new(LlamaServerLoader::new(config.clone()).unwrap()),
        SessionConfig::default(),
        Arc::new(NoopSink::new()),
    )
    .with_embedding(Arc::new(LlamaEmbeddingModel::new(config).unwrap()));

    session.load().await;
    assert_eq!(session.wait_until_settled().await, ModelState::Loaded);
    session
}

#[tokio::test]
async fn test_load_fails_while_server_is_warming_up() {
    let mock = MockLlama::new(false, true);
    let base_url = spawn_mock(Arc::clone(&mock)).await;

    let loader = LlamaServerLoader::new(LlamaServerConfig::new(&base_url, "m")).unwrap();
    let err = loader.load().await.unwrap_err();
    assert!(matches!(err, ModelError::LoadFailed(_)));

    mock.healthy.store(true, Ordering::SeqCst);
    let model = loader.load().await.unwrap();
    assert_eq!(model.model_id(), "m");
    assert_eq!(model.owned_by(), "llama.cpp");
}

#[tokio::test]
async fn test_load_fails_when_server_is_unreachable() {
    // Bind and drop to get a port with nothing listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let loader =
        LlamaServerLoader::new(LlamaServerConfig::new(format!("http://127.0.0.1:{port}"), "m"))
            .unwrap();
    assert!(matches!(
        loader.load().await,
        Err(ModelError::LoadFailed(_))
    ));
}

#[tokio::test]
async fn test_completion_stream_yields_cumulative_snapshots() {
    let mock = MockLlama::new(true, true);
    let base_url = spawn_mock(Arc::clone(&mock)).await;

    let loader = LlamaServerLoader::new(LlamaServerConfig::new(&base_url, "m")).unwrap();
    let model = loader.load().await.unwrap();

    let snapshots: Vec<String> = model
        .stream_response("user: hi")
        .await
        .unwrap()
        .map(|s| s.unwrap())
        .collect()
        .await;
    assert_eq!(snapshots, vec!["Hel", "Hello"]);
    assert_eq!(mock.prompts(), vec!["user: hi"]);
}

#[tokio::test]
async fn test_rejected_prompt_maps_to_feature_provider() {
    let mock = MockLlama::new(true, true);
    let base_url = spawn_mock(mock).await;

    let loader = LlamaServerLoader::new(LlamaServerConfig::new(&base_url, "m")).unwrap();
    let model = loader.load().await.unwrap();

    let err = model.stream_response("reject me").await.err().unwrap();
    assert_eq!(err, ModelError::FeatureProvider);
}

#[tokio::test]
async fn test_embeddings_disabled_on_server() {
    let mock = MockLlama::new(true, false);
    let base_url = spawn_mock(mock).await;

    let session = loaded_session(&base_url).await;
    assert_eq!(
        session.generate_embedding("hello").await,
        Err(ModelError::UnsupportedForCustomModel)
    );
}

#[tokio::test]
async fn test_gateway_end_to_end() {
    let mock = MockLlama::new(true, true);
    let base_url = spawn_mock(Arc::clone(&mock)).await;
    let session = loaded_session(&base_url).await;

    let gateway = GatewayServer::new(Arc::new(session.clone()), Arc::new(NoopSink::new()));
    let config = GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: None,
        fallback_port: 0,
    };
    gateway.start(&config).await.unwrap();
    let addr = gateway.bound_addr().await.unwrap();
    let client = reqwest::Client::new();

    // Models list reflects the loaded model
    let models: Value = client
        .get(format!("http://{addr}/v1/models"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(models["data"][0]["id"], "test-model");
    assert_eq!(models["data"][0]["owned_by"], "llama.cpp");

    // Non-streaming chat
    let chat: Value = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .json(&json!({
            "model": "test-model",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chat["choices"][0]["message"]["content"], "Hello");
    assert_eq!(chat["usage"]["completion_tokens"], 5);

    // Streaming chat
    let body = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .json(&json!({
            "model": "test-model",
            "messages": [{ "role": "user", "content": "hi again" }],
            "stream": true
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains(r#""content":"Hel""#));
    assert!(body.contains(r#""content":"lo""#));
    assert!(body.contains(r#""finish_reason":"stop""#));
    assert!(body.ends_with("data: [DONE]\n\n"));

    // Embeddings
    let embedding: Value = client
        .post(format!("http://{addr}/v1/embeddings"))
        .json(&json!({ "model": "test-model", "input": "hello" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(embedding["data"][0]["embedding"], json!([0.25, 0.5, 0.75]));

    // Single-turn mode sends only the latest message
    assert_eq!(mock.prompts(), vec!["user: hi", "user: hi again"]);

    // Unloading makes generation unavailable
    session.unload().await;
    let status = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .json(&json!({
            "model": "test-model",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);

    gateway.stop().await;
}

#[tokio::test]
async fn test_memory_mode_sends_history() {
    let mock = MockLlama::new(true, true);
    let base_url = spawn_mock(Arc::clone(&mock)).await;
    let session = loaded_session(&base_url).await;
    session.set_memory_mode(true);

    let messages = vec![
        ConversationMessage::user("hi"),
        ConversationMessage::assistant("Hello"),
        ConversationMessage::user("again"),
    ];
    let stream = session.generate(messages).await.unwrap();
    let _: Vec<_> = stream.collect().await;

    assert_eq!(mock.prompts(), vec!["user: hi\nassistant: Hello\nuser: again"]);
}
