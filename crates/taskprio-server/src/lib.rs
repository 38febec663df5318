//! TaskPrio Server Library
//!
//! In-memory task store, rule registry and priority ledger, the rule engine
//! that ties them together, and the HTTP API in front of them.

pub mod config;
pub mod engine;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod registry;
pub mod state;
pub mod store;

pub use config::Config;
pub use engine::{
    BatchOutcome, Evaluation, ReevaluationSummary, RuleEngine, TaskFailure, TaskUpdate,
};
pub use lifecycle::{NewTask, StatusUpdate, TaskService};
pub use registry::RuleRegistry;
pub use state::AppState;
