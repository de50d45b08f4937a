//! The per-item enrichment pipeline.
//!
//! Stages run in a fixed order:
//! 1. Reachability Validation
//! 2. Visual & Social Discovery
//! 3. Content Extraction
//! 4. Pricing Extraction
//! 5. Narrative Generation
//!
//! Only a stage 1 `error` stops the run early; the remaining stages are then
//! reported as cancelled. A run succeeds overall when at least
//! [`SUCCESS_THRESHOLD`] stages report `success`.

mod retry;
mod runner;
mod stages;
mod types;

pub use retry::{RetryPolicy, MAX_RETRY_DELAY};
pub use runner::{PipelineRunner, UNKNOWN_ITEM_NAME};
pub use stages::{execute_stage, StageInputs, StageOutput};
pub use types::{
    meets_threshold, PipelineReport, PipelineRun, StageKind, StageResult, StageStatus,
    CANCELLED_MESSAGE, SUCCESS_THRESHOLD,
};
