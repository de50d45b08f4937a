//! Bounded-concurrency batch scheduler.
//!
//! A batch drains an ordered list of item ids. At most
//! `concurrency_limit` items are in flight at once, and at most
//! `session_cap` items are admitted per run; anything left over is reported
//! in [`BatchSummary::remaining_queued`] for a follow-up run.

mod config;
mod runner;
mod types;

pub use config::BatchConfig;
pub use runner::{BatchScheduler, EnrichmentProcessor, ItemProcessor};
pub use types::{BatchMode, BatchProgress, BatchSummary, BatchTracker, ItemOutcome, ItemResult};
