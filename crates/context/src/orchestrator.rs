//! Answer orchestrator
//!
//! Owns the lazily built retrieval + generation chain. Initialisation runs
//! on the first question, at most once per success, under a single async
//! lock:
//!
//! ```text
//! Uninitialized -> RetrieverReady -> ModelReady -> ChainReady
//!                                 \-> Failed(reason)
//! ```
//!
//! A retriever that fails to open leaves the orchestrator `Uninitialized`
//! and the next question tries again. A backend that fails to initialise
//! is cached as `Failed` and its reason becomes the answer to every later
//! question until restart.
//!
//! Once the chain is ready it is also published outside the lock, so
//! steady-state questions and readiness checks never contend with it.

use crate::backends::{create_backend, BackendSelection, GenerationBackend};
use crate::prompt::{format_context, render_prompt};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use stormwatch_common::config::AppConfig;
use stormwatch_common::errors::{AppError, Result};
use stormwatch_common::metrics;
use stormwatch_search::{open_retriever, Retriever};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, instrument, warn};

/// Builds the expensive components on demand
#[async_trait::async_trait]
pub trait ComponentFactory: Send + Sync {
    /// Load the embedding provider and open the persisted index
    async fn open_retriever(&self) -> Result<Arc<dyn Retriever>>;

    /// Initialise the selected generation backend
    async fn create_backend(&self, selection: &BackendSelection) -> Result<Arc<dyn GenerationBackend>>;
}

/// Factory wired from application configuration
pub struct DefaultFactory {
    config: Arc<AppConfig>,
}

impl DefaultFactory {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl ComponentFactory for DefaultFactory {
    async fn open_retriever(&self) -> Result<Arc<dyn Retriever>> {
        let retriever = open_retriever(&self.config).await?;
        Ok(Arc::new(retriever))
    }

    async fn create_backend(&self, selection: &BackendSelection) -> Result<Arc<dyn GenerationBackend>> {
        create_backend(selection, &self.config.generation)
    }
}

/// Retriever and backend bound to the grounding prompt
struct Chain {
    retriever: Arc<dyn Retriever>,
    backend: Arc<dyn GenerationBackend>,
}

struct Generated {
    answer: String,
    retrieved: usize,
}

impl Chain {
    async fn invoke(&self, question: &str) -> Result<Generated> {
        let result = self.retriever.retrieve(question).await?;
        let context = format_context(&result);
        let prompt = render_prompt(&context, question);

        debug!(retrieved = result.len(), prompt_len = prompt.len(), "Prompt rendered");

        let answer = self.backend.generate(&prompt).await?;
        Ok(Generated {
            answer,
            retrieved: result.len(),
        })
    }
}

enum Stage {
    Uninitialized,
    RetrieverReady(Arc<dyn Retriever>),
    ModelReady {
        retriever: Arc<dyn Retriever>,
        backend: Arc<dyn GenerationBackend>,
    },
    ChainReady(Arc<Chain>),
    Failed(String),
}

impl Stage {
    fn name(&self) -> StageName {
        match self {
            Stage::Uninitialized => StageName::Uninitialized,
            Stage::RetrieverReady(_) => StageName::RetrieverReady,
            Stage::ModelReady { .. } => StageName::ModelReady,
            Stage::ChainReady(_) => StageName::ChainReady,
            Stage::Failed(_) => StageName::Failed,
        }
    }
}

/// Externally visible orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Uninitialized,
    /// Initialisation is in progress on another task
    Initializing,
    RetrieverReady,
    ModelReady,
    ChainReady,
    Failed,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Uninitialized => "uninitialized",
            StageName::Initializing => "initializing",
            StageName::RetrieverReady => "retriever_ready",
            StageName::ModelReady => "model_ready",
            StageName::ChainReady => "chain_ready",
            StageName::Failed => "failed",
        }
    }
}

/// Question answering over the alert index
pub struct Orchestrator {
    factory: Arc<dyn ComponentFactory>,
    selection: BackendSelection,
    state: Mutex<Stage>,
    ready: OnceCell<Arc<Chain>>,
    initializations: AtomicUsize,
}

impl Orchestrator {
    /// Record the backend selection and defer everything else to the first
    /// question
    pub fn new(config: &AppConfig, factory: Arc<dyn ComponentFactory>) -> Self {
        let selection = BackendSelection::resolve(&config.generation);
        info!(
            backend = selection.kind.as_str(),
            model = %selection.model,
            "Generation backend selected"
        );

        Self {
            factory,
            selection,
            state: Mutex::new(Stage::Uninitialized),
            ready: OnceCell::new(),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Orchestrator backed by the configured index, embedder and backend
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let factory = Arc::new(DefaultFactory::new(Arc::clone(&config)));
        Self::new(&config, factory)
    }

    pub fn selection(&self) -> &BackendSelection {
        &self.selection
    }

    /// Number of initialisation sequences started so far
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Current stage without waiting on, or triggering, initialisation
    pub fn stage(&self) -> StageName {
        if self.ready.initialized() {
            return StageName::ChainReady;
        }
        match self.state.try_lock() {
            Ok(state) => state.name(),
            Err(_) => StageName::Initializing,
        }
    }

    /// Answer a question, or report why it could not be answered
    #[instrument(level = "debug", skip(self))]
    pub async fn answer(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation {
                message: "query must not be empty".to_string(),
                field: Some("query".to_string()),
            });
        }

        let start = Instant::now();
        let chain = self.chain().await?;

        match chain.invoke(query).await {
            Ok(generated) => {
                metrics::record_query(
                    start.elapsed().as_secs_f64(),
                    self.selection.kind.as_str(),
                    generated.retrieved,
                    true,
                );
                Ok(generated.answer)
            }
            Err(e) => {
                metrics::record_query(start.elapsed().as_secs_f64(), self.selection.kind.as_str(), 0, false);
                metrics::record_generation_error(e.code().as_str());
                warn!(error = %e, "Question could not be answered");
                Err(e)
            }
        }
    }

    /// Answer a question; failures come back as the answer text
    pub async fn respond(&self, query: &str) -> String {
        match self.answer(query).await {
            Ok(answer) => answer,
            Err(e) => e.as_answer(),
        }
    }

    /// Return the ready chain, driving initialisation forward if needed.
    /// Callers arriving mid-initialisation wait on the lock.
    async fn chain(&self) -> Result<Arc<Chain>> {
        if let Some(chain) = self.ready.get() {
            return Ok(Arc::clone(chain));
        }

        let mut state = self.state.lock().await;

        loop {
            let next = match &*state {
                Stage::ChainReady(chain) => return Ok(Arc::clone(chain)),
                Stage::Failed(reason) => {
                    warn!(reason = %reason, "Serving cached initialisation failure");
                    return Err(AppError::BackendInit {
                        message: reason.clone(),
                    });
                }
                Stage::Uninitialized => {
                    let attempt = self.initializations.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(attempt, "Opening retriever");

                    match self.factory.open_retriever().await {
                        Ok(retriever) => {
                            metrics::record_initialization("retriever", true);
                            Stage::RetrieverReady(retriever)
                        }
                        Err(e) => {
                            metrics::record_initialization("retriever", false);
                            warn!(error = %e, "Retriever unavailable; will retry on next question");
                            return Err(e);
                        }
                    }
                }
                Stage::RetrieverReady(retriever) => {
                    let retriever = Arc::clone(retriever);
                    info!(
                        backend = self.selection.kind.as_str(),
                        model = %self.selection.model,
                        "Initialising generation backend"
                    );

                    match self.factory.create_backend(&self.selection).await {
                        Ok(backend) => {
                            metrics::record_initialization("model", true);
                            Stage::ModelReady { retriever, backend }
                        }
                        Err(e) => {
                            metrics::record_initialization("model", false);
                            let reason = match e {
                                AppError::BackendInit { message } => message,
                                other => other.to_string(),
                            };
                            error!(reason = %reason, "Generation backend failed to initialise");
                            Stage::Failed(reason)
                        }
                    }
                }
                Stage::ModelReady { retriever, backend } => {
                    metrics::record_initialization("chain", true);
                    info!("Answer chain ready");
                    let chain = Arc::new(Chain {
                        retriever: Arc::clone(retriever),
                        backend: Arc::clone(backend),
                    });
                    // Only ever set here, under the lock
                    let _ = self.ready.set(Arc::clone(&chain));
                    Stage::ChainReady(chain)
                }
            };

            *state = next;
        }
    }
}
