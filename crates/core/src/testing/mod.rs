//! Testing utilities and mock implementations.
//!
//! Mocks for every external collaborator the pipeline talks to, so runs can
//! be exercised end to end without network services or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use curator_core::testing::{fixtures, MockCapabilities};
//! use curator_core::pipeline::PipelineRunner;
//!
//! let mocks = MockCapabilities::new();
//! mocks.narrative.fail_with("model overloaded").await;
//!
//! let runner = PipelineRunner::new(mocks.build()).with_retry(fixtures::fast_retry());
//! let report = runner.run(&fixtures::item("t1")).await;
//! assert!(report.run.overall_success);
//! ```

mod mock_capabilities;
mod mock_history_store;
mod mock_item_store;

pub use mock_capabilities::{
    MockCapabilities, MockContent, MockDiscovery, MockNarrative, MockPricing, MockReachability,
};
pub use mock_history_store::MockHistoryStore;
pub use mock_item_store::MockItemStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::time::Duration;

    use crate::enrichment::ReachabilityReport;
    use crate::item::{ToolEntry, WorkItem};
    use crate::pipeline::RetryPolicy;

    /// URL used for an item id by [`item`] and [`tool_entry`].
    pub fn url_for(id: &str) -> String {
        format!("https://{}.example.com", id)
    }

    /// Idle, unchecked work item.
    pub fn item(id: &str) -> WorkItem {
        WorkItem::new(id, id, url_for(id))
    }

    /// `count` idle items with ids `item-0`, `item-1`, ...
    pub fn items(count: usize) -> Vec<WorkItem> {
        (0..count).map(|i| item(&format!("item-{}", i))).collect()
    }

    pub fn tool_entry(id: &str, name: &str) -> ToolEntry {
        ToolEntry {
            id: id.to_string(),
            slug: id.to_string(),
            name: name.to_string(),
            url: url_for(id),
        }
    }

    /// Report for a DNS resolution failure.
    pub fn dns_failure() -> ReachabilityReport {
        ReachabilityReport {
            http_code: None,
            http_chain: Some("DNS".to_string()),
            is_valid: false,
        }
    }

    /// Report for a plain HTTP status.
    pub fn http_status(code: u16) -> ReachabilityReport {
        ReachabilityReport {
            http_code: Some(code),
            http_chain: Some(code.to_string()),
            is_valid: (200..400).contains(&code),
        }
    }

    /// Three attempts, 1ms apart.
    pub fn fast_retry() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::from_millis(1))
    }
}
