//! Shared application state.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::ledger::PriorityLedger;
use crate::registry::RuleRegistry;
use crate::store::TaskStore;

/// Shared application state.
///
/// Lock order is registry, then a single task, then the ledger. Nothing
/// takes the registry while holding a task lock.
pub struct AppState {
    /// Server configuration.
    pub config: Config,

    /// Tasks with per-task locks.
    pub store: TaskStore,

    /// Rule, template and group definitions.
    pub registry: RwLock<RuleRegistry>,

    /// Append-only priority change log.
    pub ledger: PriorityLedger,

    /// Cancelled on shutdown; long scans stop at the next task boundary.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(config: Config) -> Arc<Self> {
        let registry = RuleRegistry::new(config.bounds);
        Arc::new(Self {
            config,
            store: TaskStore::new(),
            registry: RwLock::new(registry),
            ledger: PriorityLedger::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Get the number of tasks.
    pub async fn task_count(&self) -> usize {
        self.store.len().await
    }
}

impl Default for AppState {
    fn default() -> Self {
        let config = Config::default();
        Self {
            registry: RwLock::new(RuleRegistry::new(config.bounds)),
            config,
            store: TaskStore::new(),
            ledger: PriorityLedger::new(),
            shutdown: CancellationToken::new(),
        }
    }
}
