//! Batch scheduler configuration.

use serde::{Deserialize, Serialize};

/// Limits for one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum items processed at the same time.
    /// Keeps load on the screenshot and AI services bounded.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Maximum items admitted by one run.
    /// Anything beyond this stays queued and is reported back to the caller.
    #[serde(default = "default_session_cap")]
    pub session_cap: usize,
}

fn default_concurrency_limit() -> usize {
    5
}

fn default_session_cap() -> usize {
    50
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            session_cap: default_session_cap(),
        }
    }
}

impl BatchConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_session_cap(mut self, cap: usize) -> Self {
        self.session_cap = cap;
        self
    }
}
