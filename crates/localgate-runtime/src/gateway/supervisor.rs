//! Gateway supervisor: start/stop state machine around the HTTP server.
//!
//! Key design decisions:
//! - **Bind-then-report**: the listener binds first; `Running` and the
//!   reachable address are published only after a successful bind
//! - **No retry**: a bind failure moves to `Error` and stays there until the
//!   next explicit `start()`
//! - **Crash detection**: a serving task that ends without being cancelled
//!   moves the state to `Error`

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use localgate_core::{
    DEFAULT_BIND_HOST, DEFAULT_SERVER_PORT, EventSink, GatewayEvent, InferencePort, ServerError,
    ServerState, Settings, resolve_server_port,
};

use super::address::advertised_host;

/// How long `stop()` waits for in-flight requests before aborting.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Listen configuration for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1").
    pub host: String,
    /// Requested port. Values at or below 1024 are replaced by `fallback_port`.
    pub port: Option<u16>,
    /// Port used when `port` is missing or not allowed.
    pub fallback_port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BIND_HOST.to_string(),
            port: None,
            fallback_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl GatewayConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.effective_bind_host().to_string(),
            port: settings.server_port,
            ..Self::default()
        }
    }

    /// Port that will actually be bound.
    #[must_use]
    pub const fn resolved_port(&self) -> u16 {
        resolve_server_port(self.port, self.fallback_port)
    }
}

/// State plus reachable address, published together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GatewayStatus {
    pub state: ServerState,
    /// `http://<host>:<port>` while running.
    pub address: Option<String>,
}

struct Shared {
    status_tx: watch::Sender<GatewayStatus>,
    sink: Arc<dyn EventSink>,
}

impl Shared {
    fn state(&self) -> ServerState {
        self.status_tx.borrow().state.clone()
    }

    fn publish(&self, state: ServerState, address: Option<String>) {
        let event = GatewayEvent::server_state(&state, address.as_deref());
        self.status_tx.send_replace(GatewayStatus { state, address });
        self.sink.emit(event);
    }
}

/// Handle to a running gateway task.
struct GatewayHandle {
    cancel_token: CancellationToken,
    join_handle: JoinHandle<()>,
    bound_addr: SocketAddr,
}

/// Owns the gateway lifecycle.
///
/// # Example
///
/// ```ignore
/// let server = GatewayServer::new(session, sink);
/// server.start(&GatewayConfig::default()).await?;
/// println!("Listening at {:?}", server.address());
/// server.stop().await;
/// ```
pub struct GatewayServer {
    inference: Arc<dyn InferencePort>,
    shared: Arc<Shared>,
    handle: Mutex<Option<GatewayHandle>>,
}

impl GatewayServer {
    pub fn new(inference: Arc<dyn InferencePort>, sink: Arc<dyn EventSink>) -> Self {
        let (status_tx, _) = watch::channel(GatewayStatus::default());
        Self {
            inference,
            shared: Arc::new(Shared { status_tx, sink }),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServerState {
        self.shared.state()
    }

    /// Reachable address while running.
    pub fn address(&self) -> Option<String> {
        self.shared.status_tx.borrow().address.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Socket address the listener is bound to, if a task is running.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        let guard = self.handle.lock().await;
        guard
            .as_ref()
            .filter(|h| !h.join_handle.is_finished())
            .map(|h| h.bound_addr)
    }

    /// Start serving.
    ///
    /// No-op while starting or running. A bind failure moves the server to
    /// the error state and is returned.
    pub async fn start(&self, config: &GatewayConfig) -> Result<(), ServerError> {
        let mut guard = self.handle.lock().await;

        let current = self.shared.state();
        if current.is_starting_or_running() {
            debug!(state = %current, "Gateway already started");
            return Ok(());
        }

        // A task left over from a crash has already finished.
        if let Some(old) = guard.take() {
            old.cancel_token.cancel();
            old.join_handle.abort();
        }

        self.shared.publish(ServerState::Starting, None);

        let port = config.resolved_port();
        if let Some(requested) = config.port
            && requested != port
        {
            warn!("Port {requested} is not allowed, using {port}");
        }

        let listener = match TcpListener::bind((config.host.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                return Err(self.fail(ServerError::BindFailed {
                    address: format!("{}:{port}", config.host),
                    reason: e.to_string(),
                }));
            }
        };

        let bound_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                return Err(self.fail(ServerError::Internal(format!(
                    "Failed to get local address: {e}"
                ))));
            }
        };

        let address = format!("http://{}:{}", advertised_host(&config.host), bound_addr.port());
        info!("Gateway bound to {bound_addr}, reachable at {address}");

        // Publish before spawning so an early crash cannot be overwritten.
        self.shared.publish(ServerState::Running, Some(address));

        let cancel_token = CancellationToken::new();
        let join_handle = tokio::spawn(run_gateway(
            listener,
            Arc::clone(&self.inference),
            cancel_token.clone(),
            Arc::clone(&self.shared),
        ));

        *guard = Some(GatewayHandle {
            cancel_token,
            join_handle,
            bound_addr,
        });

        Ok(())
    }

    /// Stop serving.
    ///
    /// No-op unless starting or running. Waits up to [`STOP_TIMEOUT`] for
    /// in-flight requests, then aborts the task.
    pub async fn stop(&self) {
        let mut guard = self.handle.lock().await;

        if !self.shared.state().is_starting_or_running() {
            debug!("Gateway not running, nothing to stop");
            return;
        }

        if let Some(handle) = guard.take() {
            info!("Stopping gateway on {}", handle.bound_addr);
            handle.cancel_token.cancel();

            let mut join = handle.join_handle;
            match tokio::time::timeout(STOP_TIMEOUT, &mut join).await {
                Ok(Ok(())) => info!("Gateway stopped cleanly"),
                Ok(Err(join_err)) => error!("Gateway task panicked: {join_err}"),
                Err(_) => {
                    warn!("Gateway stop timed out; aborting task");
                    join.abort();
                }
            }
        }

        if !self.shared.state().is_error() {
            self.shared.publish(ServerState::Stopped, None);
        }
    }

    fn fail(&self, err: ServerError) -> ServerError {
        error!("Gateway start failed: {err}");
        self.shared.publish(ServerState::Error(err.clone()), None);
        err
    }
}

impl fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayServer")
            .field("status", &*self.shared.status_tx.borrow())
            .finish_non_exhaustive()
    }
}

/// Serving task body. Reports an error state if serving ends on its own.
async fn run_gateway(
    listener: TcpListener,
    inference: Arc<dyn InferencePort>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
) {
    let result = localgate_gateway::serve(listener, inference, cancel.clone()).await;
    report_exit(result, &cancel, &shared);
}

/// Record how the serving task ended. Anything but a requested stop moves
/// the server to `Error`.
fn report_exit<E: fmt::Display>(
    result: Result<(), E>,
    cancel: &CancellationToken,
    shared: &Shared,
) {
    if cancel.is_cancelled() {
        if let Err(e) = result {
            warn!("Gateway ended with error during shutdown: {e}");
        }
        return;
    }

    let reason = match result {
        Ok(()) => "gateway stopped unexpectedly".to_string(),
        Err(e) => e.to_string(),
    };
    error!("Gateway failed: {reason}");
    shared.publish(ServerState::Error(ServerError::Serve(reason)), None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use localgate_core::{
        ConversationMessage, ModelCard, ModelError, ModelState, SnapshotStream,
    };

    /// Mock inference port for testing.
    #[derive(Debug)]
    struct MockInference;

    #[async_trait]
    impl InferencePort for MockInference {
        fn state(&self) -> ModelState {
            ModelState::NotLoaded
        }

        async fn model_card(&self) -> Option<ModelCard> {
            None
        }

        async fn generate(
            &self,
            _messages: Vec<ConversationMessage>,
        ) -> Result<SnapshotStream, ModelError> {
            Err(ModelError::NotLoaded)
        }

        async fn generate_embedding(&self, _text: &str) -> Result<Vec<f64>, ModelError> {
            Err(ModelError::EmbeddingModelUnavailable)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        states: Arc<StdMutex<Vec<String>>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: GatewayEvent) {
            if let GatewayEvent::ServerStateChanged { state, .. } = event {
                self.states.lock().unwrap().push(state);
            }
        }

        fn clone_box(&self) -> Box<dyn EventSink> {
            Box::new(self.clone())
        }
    }

    fn local_config(port: Option<u16>) -> GatewayConfig {
        GatewayConfig {
            host: "127.0.0.1".to_string(),
            port,
            fallback_port: 0, // Random port
        }
    }

    fn make_server() -> (GatewayServer, RecordingSink) {
        let sink = RecordingSink::default();
        let server = GatewayServer::new(Arc::new(MockInference), Arc::new(sink.clone()));
        (server, sink)
    }

    #[tokio::test]
    async fn test_gateway_lifecycle() {
        let (server, sink) = make_server();

        // Initially stopped
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(server.address(), None);

        server.start(&local_config(None)).await.unwrap();
        assert_eq!(server.state(), ServerState::Running);
        let bound = server.bound_addr().await.unwrap();
        assert_ne!(bound.port(), 0);
        assert_eq!(
            server.address().unwrap(),
            format!("http://localhost:{}", bound.port())
        );

        let body = reqwest::get(format!("http://{bound}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "Server is running.");

        // Starting again is a no-op
        server.start(&local_config(None)).await.unwrap();
        assert_eq!(server.bound_addr().await, Some(bound));

        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(server.address(), None);

        // Stopping again is a no-op
        server.stop().await;
        assert_eq!(
            *sink.states.lock().unwrap(),
            vec!["starting", "running", "stopped"]
        );
    }

    #[tokio::test]
    async fn test_serving_ending_on_its_own_is_an_error() {
        let (server, sink) = make_server();
        server.start(&local_config(None)).await.unwrap();

        report_exit(Ok::<(), String>(()), &CancellationToken::new(), &server.shared);
        assert_eq!(
            server.state(),
            ServerState::Error(ServerError::Serve("gateway stopped unexpectedly".into()))
        );
        assert_eq!(server.address(), None);

        report_exit(
            Err::<(), _>("accept loop failed"),
            &CancellationToken::new(),
            &server.shared,
        );
        assert_eq!(
            server.state(),
            ServerState::Error(ServerError::Serve("accept loop failed".into()))
        );

        // stop() keeps the error visible.
        server.stop().await;
        assert!(server.state().is_error());
        assert_eq!(
            *sink.states.lock().unwrap(),
            vec!["starting", "running", "error", "error"]
        );
    }

    #[tokio::test]
    async fn test_requested_stop_is_not_an_error() {
        let (server, sink) = make_server();
        server.start(&local_config(None)).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        report_exit(Err::<(), _>("connection reset"), &cancel, &server.shared);
        assert_eq!(server.state(), ServerState::Running);

        server.stop().await;
        assert_eq!(
            *sink.states.lock().unwrap(),
            vec!["starting", "running", "stopped"]
        );
    }

    #[tokio::test]
    async fn test_bind_failure_moves_to_error() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = blocker.local_addr().unwrap().port();
        assert!(taken > 1024);

        let (server, _) = make_server();
        let err = server.start(&local_config(Some(taken))).await.unwrap_err();
        assert!(matches!(err, ServerError::BindFailed { .. }));
        assert!(server.state().is_error());

        // stop() leaves the error state alone
        server.stop().await;
        assert!(server.state().is_error());

        // An explicit start recovers once the port is free
        drop(blocker);
        server.start(&local_config(Some(taken))).await.unwrap();
        assert_eq!(server.state(), ServerState::Running);
        assert_eq!(server.bound_addr().await.unwrap().port(), taken);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_privileged_port_is_replaced() {
        let config = local_config(Some(80));
        assert_eq!(config.resolved_port(), 0);

        let (server, _) = make_server();
        server.start(&config).await.unwrap();
        let port = server.bound_addr().await.unwrap().port();
        assert_ne!(port, 80);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (server, _) = make_server();

        server.start(&local_config(None)).await.unwrap();
        server.stop().await;
        server.start(&local_config(None)).await.unwrap();
        assert_eq!(server.state(), ServerState::Running);
        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            server_port: Some(1000),
            bind_host: Some("127.0.0.1".into()),
            ..Settings::default()
        };
        let config = GatewayConfig::from_settings(&settings);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.resolved_port(), DEFAULT_SERVER_PORT);
    }
}
