//! Run history: a best-effort audit trail of pipeline runs.
//!
//! [`RunHistoryRecorder`] projects a [`crate::pipeline::PipelineRun`] into a
//! [`RunHistoryRecord`] (stage status and message, timing, overall outcome)
//! and writes it to a [`HistoryStore`]. [`SqliteHistoryStore`] keeps records
//! in the `run_history` table next to the item store.

mod recorder;
mod sqlite;
mod store;
mod types;

pub use recorder::RunHistoryRecorder;
pub use sqlite::SqliteHistoryStore;
pub use store::{HistoryError, HistoryFilter, HistoryStore};
pub use types::{RunHistoryRecord, StageSummary};
