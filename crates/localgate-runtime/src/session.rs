//! Model session: lifecycle of the loaded model and prompt construction.
//!
//! The session owns at most one [`LanguageModel`] at a time. Loading runs on
//! a detached task; readers observe progress through a `watch` channel so
//! `state()` never waits on an in-flight transition.
//!
//! Every load attempt gets an epoch number. `unload()` bumps the epoch, so a
//! load that finishes after the session was unloaded is discarded instead of
//! bringing the model back.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tokio::sync::{Mutex, Semaphore, watch};
use tracing::{debug, info, warn};

use localgate_core::{
    CharCountEstimator, ConversationMessage, EmbeddingModel, EventSink, GatewayEvent,
    InferencePort, LanguageModel, ModelCard, ModelError, ModelLoader, ModelState, PromptBudget,
    PromptMode, Settings, SettingsError, SnapshotStream, build_prompt,
    validate_settings,
};

/// Tuning for a [`ModelSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Context window and response reserve.
    pub budget: PromptBudget,
    /// Start in multi-turn mode.
    pub memory_mode: bool,
    /// Generations allowed to run at once.
    pub max_concurrent_generations: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            budget: PromptBudget::default(),
            memory_mode: false,
            max_concurrent_generations: 1,
        }
    }
}

impl SessionConfig {
    /// Derive the session configuration from validated settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        validate_settings(settings)?;
        Ok(Self {
            budget: settings.effective_budget()?,
            memory_mode: settings.effective_prompt_mode() == PromptMode::MultiTurn,
            max_concurrent_generations: settings.effective_max_concurrent_generations(),
        })
    }
}

struct LoadedModel {
    model: Arc<dyn LanguageModel>,
    card: ModelCard,
}

#[derive(Default)]
struct Lifecycle {
    epoch: u64,
    loaded: Option<LoadedModel>,
}

struct SessionInner {
    loader: Arc<dyn ModelLoader>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    sink: Arc<dyn EventSink>,
    budget: PromptBudget,
    memory_mode: AtomicBool,
    generation_slots: Arc<Semaphore>,
    state_tx: watch::Sender<ModelState>,
    lifecycle: Mutex<Lifecycle>,
}

impl SessionInner {
    /// Publish a state change. Callers hold the lifecycle lock, which keeps
    /// the reported sequence in transition order.
    fn set_state(&self, next: ModelState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if changed {
            debug!(state = %next, "Model state changed");
            self.sink.emit(GatewayEvent::model_state(&next));
        }
    }

    async fn finish_load(&self, epoch: u64, result: Result<Arc<dyn LanguageModel>, ModelError>) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.epoch != epoch {
            debug!(epoch, current = lifecycle.epoch, "Discarding superseded model load");
            return;
        }

        match result {
            Ok(model) => {
                let card = ModelCard::new(model.model_id(), model.owned_by());
                info!(model = %card.id, "Model loaded");
                self.sink.log(&format!("Model '{}' loaded.", card.id));
                lifecycle.loaded = Some(LoadedModel { model, card });
                self.set_state(ModelState::Loaded);
            }
            Err(e) => {
                warn!("Model load failed: {e}");
                self.sink.log(&format!("Model load failed: {e}"));
                self.set_state(ModelState::Error(e));
            }
        }
    }
}

/// The single shared model session.
///
/// Cheap to clone; clones share the same model and state.
#[derive(Clone)]
pub struct ModelSession {
    inner: Arc<SessionInner>,
}

impl ModelSession {
    /// Create a session in the `NotLoaded` state.
    pub fn new(loader: Arc<dyn ModelLoader>, config: SessionConfig, sink: Arc<dyn EventSink>) -> Self {
        let (state_tx, _) = watch::channel(ModelState::NotLoaded);
        Self {
            inner: Arc::new(SessionInner {
                loader,
                embedder: None,
                sink,
                budget: config.budget,
                memory_mode: AtomicBool::new(config.memory_mode),
                generation_slots: Arc::new(Semaphore::new(config.max_concurrent_generations.max(1))),
                state_tx,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    fn inner_mut(&mut self) -> Option<&mut SessionInner> {
        Arc::get_mut(&mut self.inner)
    }

    /// Attach a sentence embedding capability.
    ///
    /// Has no effect once the session has been cloned.
    #[must_use]
    pub fn with_embedding(mut self, embedder: Arc<dyn EmbeddingModel>) -> Self {
        if let Some(inner) = self.inner_mut() {
            inner.embedder = Some(embedder);
        }
        self
    }

    /// Current state.
    pub fn state(&self) -> ModelState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.inner.state_tx.subscribe()
    }

    /// Start loading the model.
    ///
    /// No-op when already loaded or loading. Otherwise moves to `Loading` and
    /// initializes the model on a detached task.
    pub async fn load(&self) {
        let epoch = {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            match self.state() {
                ModelState::Loaded => {
                    info!("Model is already loaded");
                    self.inner.sink.log("Model is already loaded.");
                    return;
                }
                ModelState::Loading => {
                    debug!("Model load already in progress");
                    return;
                }
                ModelState::NotLoaded | ModelState::Error(_) => {}
            }
            lifecycle.epoch += 1;
            self.inner.set_state(ModelState::Loading);
            lifecycle.epoch
        };

        self.inner.sink.log("Loading model...");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.loader.load().await;
            inner.finish_load(epoch, result).await;
        });
    }

    /// Release the model and return to `NotLoaded`, whatever the current state.
    pub async fn unload(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        lifecycle.epoch += 1;
        if let Some(previous) = lifecycle.loaded.take() {
            info!(model = %previous.card.id, "Model unloaded");
            self.inner.sink.log("Model unloaded.");
        }
        self.inner.set_state(ModelState::NotLoaded);
    }

    /// Wait until no load is in progress and return the settled state.
    pub async fn wait_until_settled(&self) -> ModelState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Switch between single-turn and multi-turn prompting.
    pub fn set_memory_mode(&self, enabled: bool) {
        let previous = self.inner.memory_mode.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            info!(enabled, "Memory mode changed");
            self.inner.sink.log(if enabled {
                "Memory mode enabled."
            } else {
                "Memory mode disabled."
            });
        }
    }

    pub fn memory_mode(&self) -> bool {
        self.inner.memory_mode.load(Ordering::Relaxed)
    }

    /// Description of the loaded model.
    pub async fn model_card(&self) -> Option<ModelCard> {
        let lifecycle = self.inner.lifecycle.lock().await;
        lifecycle.loaded.as_ref().map(|l| l.card.clone())
    }

    /// Generate a response to a conversation.
    ///
    /// The returned stream yields the model's cumulative snapshots and holds
    /// a generation slot until it is dropped.
    pub async fn generate(
        &self,
        messages: Vec<ConversationMessage>,
    ) -> Result<SnapshotStream, ModelError> {
        let model = {
            let lifecycle = self.inner.lifecycle.lock().await;
            match (&lifecycle.loaded, self.state()) {
                (Some(loaded), ModelState::Loaded) => Arc::clone(&loaded.model),
                _ => return Err(ModelError::NotLoaded),
            }
        };

        if messages.is_empty() {
            debug!("Empty conversation, nothing to generate");
            return Ok(stream::empty().boxed());
        }

        let mode = PromptMode::from_memory_mode(self.memory_mode());
        let prompt = build_prompt(&messages, mode, self.inner.budget, &CharCountEstimator);
        debug!(
            mode = ?mode,
            included = prompt.included,
            total = messages.len(),
            estimated_tokens = prompt.estimated_tokens,
            "Built prompt"
        );

        let permit = Arc::clone(&self.inner.generation_slots)
            .acquire_owned()
            .await
            .map_err(|_| ModelError::Generation("generation slots closed".to_string()))?;

        let snapshots = match model.stream_response(&prompt.text).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!("Model could not produce a response stream: {e}");
                self.inner.sink.log(&format!("Generation failed: {e}"));
                let failure = match e {
                    ModelError::FeatureProvider => ModelError::FeatureProvider,
                    _ => ModelError::OutputProcessing,
                };
                return Ok(stream::once(async move { Err(failure) }).boxed());
            }
        };

        Ok(snapshots
            .map(move |item| {
                let _slot = &permit;
                item
            })
            .boxed())
    }

    /// Compute a sentence embedding. Independent of the chat model state.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f64>, ModelError> {
        let embedder = self
            .inner
            .embedder
            .as_ref()
            .ok_or(ModelError::EmbeddingModelUnavailable)?;
        let vector = embedder.embed(text).await?;
        if vector.is_empty() {
            return Err(ModelError::EmbeddingGenerationFailed);
        }
        Ok(vector)
    }
}

impl fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSession")
            .field("state", &self.state())
            .field("memory_mode", &self.memory_mode())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InferencePort for ModelSession {
    fn state(&self) -> ModelState {
        Self::state(self)
    }

    async fn model_card(&self) -> Option<ModelCard> {
        Self::model_card(self).await
    }

    async fn generate(
        &self,
        messages: Vec<ConversationMessage>,
    ) -> Result<SnapshotStream, ModelError> {
        Self::generate(self, messages).await
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f64>, ModelError> {
        Self::generate_embedding(self, text).await
    }
}
