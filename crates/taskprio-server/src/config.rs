//! Server configuration.

use taskprio_core::{priority, PriorityBounds};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub bind_addr: String,

    /// Valid priority range and what to do with explicit values outside it.
    pub bounds: PriorityBounds,

    /// Priority given to tasks created without one.
    pub default_priority: i32,

    /// Retry budget given to tasks created without one.
    pub default_max_retries: u32,

    /// Page size when a list request doesn't ask for one.
    pub default_page_size: usize,

    /// Upper limit on requested page sizes.
    pub max_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            bounds: PriorityBounds::default(),
            default_priority: priority::NORMAL,
            default_max_retries: taskprio_core::task::DEFAULT_MAX_RETRIES,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl Config {
    /// Builder method to set priority bounds.
    pub fn with_bounds(mut self, bounds: PriorityBounds) -> Self {
        self.bounds = bounds;
        self
    }
}
