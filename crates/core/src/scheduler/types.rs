//! Types for the batch scheduler.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::classify::ClassificationCounts;
use crate::item::{ItemStatus, ItemUpdate};
use crate::pipeline::{PipelineReport, StageKind, StageStatus};

/// What a batch does with each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// All five stages.
    #[default]
    FullPipeline,
    /// Exactly one stage, e.g. screenshot-only runs use `VisualDiscovery`.
    SingleStage(StageKind),
}

/// Result of processing one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub success: bool,
    pub message: String,
    /// Fields to copy onto the item once it completes.
    pub discovered: ItemUpdate,
}

impl ItemOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            discovered: ItemUpdate::default(),
        }
    }

    pub fn from_report(report: &PipelineReport) -> Self {
        let run = &report.run;
        let gate = run
            .stage(StageKind::Reachability)
            .filter(|r| r.status == StageStatus::Error && run.stages.len() > 1);

        let message = match gate {
            Some(result) => result.message.clone(),
            None if run.stages.len() == 1 => run
                .stages
                .values()
                .next()
                .map(|r| r.message.clone())
                .unwrap_or_default(),
            None => format!(
                "{}/{} stages succeeded",
                run.success_count(),
                run.stages.len()
            ),
        };

        Self {
            success: run.overall_success,
            message,
            discovered: report.discovered.clone(),
        }
    }
}

/// Final state of one item in a finished batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_id: String,
    pub status: ItemStatus,
    pub message: String,
}

/// Point-in-time progress of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub in_flight: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub finished: bool,
}

/// Terminal summary of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Ids never admitted because the session cap was reached.
    pub remaining_queued: usize,
    /// Ids dropped at admission because they were not idle or unknown.
    pub skipped: usize,
    pub session_cap: usize,
    pub cap_reached: bool,
    pub items: Vec<ItemResult>,
    /// Classification of the processed items after the run.
    pub classification: ClassificationCounts,
}

impl BatchSummary {
    /// Operator notice when the run stopped at the session cap.
    pub fn notice(&self) -> Option<String> {
        self.cap_reached.then(|| {
            format!(
                "Session cap of {} items reached with {} items still queued. \
                 Save the results and start a new run for the remainder.",
                self.session_cap, self.remaining_queued
            )
        })
    }
}

/// Live counters for a running batch.
#[derive(Debug, Default)]
pub struct BatchTracker {
    total: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    finished: AtomicBool,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.in_flight.store(0, Ordering::SeqCst);
        self.peak_in_flight.store(0, Ordering::SeqCst);
        self.succeeded.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);
    }

    pub(crate) fn admitted(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn completed(&self, success: bool) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        if success {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Highest number of items in flight at once during the run.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> BatchProgress {
        BatchProgress {
            completed: self.completed.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            finished: self.finished.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineRun, StageResult};
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn test_batch_mode_wire_format() {
        let full: BatchMode = serde_json::from_str(r#""full_pipeline""#).unwrap();
        assert_eq!(full, BatchMode::FullPipeline);

        let single: BatchMode =
            serde_json::from_str(r#"{"single_stage":"visual_discovery"}"#).unwrap();
        assert_eq!(single, BatchMode::SingleStage(StageKind::VisualDiscovery));
    }

    #[test]
    fn test_outcome_uses_gate_message_on_short_circuit() {
        let mut stages = BTreeMap::new();
        stages.insert(1, StageResult::error("DNS resolution failed"));
        for i in 2..=5 {
            stages.insert(i, StageResult::cancelled());
        }
        let report = PipelineReport {
            run: PipelineRun::finish(stages, Utc::now()),
            discovered: ItemUpdate::default(),
        };

        let outcome = ItemOutcome::from_report(&report);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "DNS resolution failed");
    }

    #[test]
    fn test_tracker_counts() {
        let tracker = BatchTracker::new();
        tracker.start(3);
        tracker.admitted();
        tracker.admitted();
        tracker.completed(true);
        tracker.admitted();
        tracker.completed(false);

        let progress = tracker.snapshot();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.in_flight, 1);
        assert_eq!(progress.succeeded, 1);
        assert_eq!(progress.failed, 1);
        assert!(!progress.finished);
        assert_eq!(tracker.peak_in_flight(), 2);
    }

    #[test]
    fn test_notice_only_when_capped() {
        let mut summary = BatchSummary {
            total: 25,
            completed: 10,
            succeeded: 10,
            failed: 0,
            remaining_queued: 15,
            skipped: 0,
            session_cap: 10,
            cap_reached: true,
            items: Vec::new(),
            classification: ClassificationCounts::default(),
        };
        let notice = summary.notice().unwrap();
        assert!(notice.contains("15 items still queued"));

        summary.cap_reached = false;
        assert!(summary.notice().is_none());
    }
}
