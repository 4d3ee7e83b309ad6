pub mod connections;
pub mod hub;
pub mod orchestrator;
pub mod quiz;
pub mod scoring;

use std::sync::Arc;

use crate::{
    bank::QuestionBank,
    config::AppConfig,
    dao::{memory::MemoryStore, quiz_store::QuizStore},
};

pub use self::connections::{ClientConnection, ConnectionRegistry, ConnectionRole};
pub use self::hub::SessionHub;
pub use self::orchestrator::QuizOrchestrator;

pub type SharedState = Arc<AppState>;

/// Capacity of each session's broadcast channel.
const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Central application state storing live connections, the repository, and
/// the quiz orchestrator.
pub struct AppState {
    store: Arc<dyn QuizStore>,
    registry: ConnectionRegistry,
    hub: Arc<SessionHub>,
    orchestrator: Arc<QuizOrchestrator>,
    bank: QuestionBank,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, bank: QuestionBank) -> SharedState {
        let config = Arc::new(config);
        let store: Arc<dyn QuizStore> = Arc::new(MemoryStore::new());
        let hub = Arc::new(SessionHub::new(SESSION_CHANNEL_CAPACITY));
        let orchestrator = Arc::new(QuizOrchestrator::new(
            store.clone(),
            hub.clone(),
            config.clone(),
        ));

        Arc::new(Self {
            store,
            registry: ConnectionRegistry::new(),
            hub,
            orchestrator,
            bank,
            config,
        })
    }

    /// Handle to the storage backend.
    pub fn store(&self) -> &Arc<dyn QuizStore> {
        &self.store
    }

    /// Registry of live WebSocket connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Per-session broadcast hub.
    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    /// The quiz orchestration core.
    pub fn orchestrator(&self) -> &Arc<QuizOrchestrator> {
        &self.orchestrator
    }

    /// The fixed question bank consumed at quiz initialization.
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }
}
