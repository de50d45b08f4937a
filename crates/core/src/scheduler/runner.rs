//! Batch scheduler implementation.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::classify::ClassificationCounts;
use crate::item::{ItemArena, ItemStatus, WorkItem};
use crate::metrics;
use crate::pipeline::PipelineRunner;

use super::config::BatchConfig;
use super::types::{BatchMode, BatchProgress, BatchSummary, BatchTracker, ItemOutcome, ItemResult};

/// Per-item work run by the scheduler.
///
/// Implementations report failures through [`ItemOutcome`]; a panic inside
/// `process` is caught and recorded as a failed item.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: WorkItem) -> ItemOutcome;
}

/// Runs the enrichment pipeline (or one stage of it) per item.
#[derive(Debug, Clone)]
pub struct EnrichmentProcessor {
    runner: Arc<PipelineRunner>,
    mode: BatchMode,
}

impl EnrichmentProcessor {
    pub fn new(runner: Arc<PipelineRunner>, mode: BatchMode) -> Self {
        Self { runner, mode }
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }
}

#[async_trait]
impl ItemProcessor for EnrichmentProcessor {
    async fn process(&self, item: WorkItem) -> ItemOutcome {
        let report = match self.mode {
            BatchMode::FullPipeline => self.runner.run(&item).await,
            BatchMode::SingleStage(kind) => self.runner.run_stage(kind, &item).await,
        };
        ItemOutcome::from_report(&report)
    }
}

/// Drains a list of item ids with bounded concurrency and a session cap.
///
/// Ids are admitted in list order; completions arrive in any order. Items
/// are addressed by id in the shared [`ItemArena`] on every access, and the
/// scheduler is the only writer of their status.
pub struct BatchScheduler {
    config: BatchConfig,
    arena: Arc<ItemArena>,
    tracker: Arc<BatchTracker>,
}

impl BatchScheduler {
    pub fn new(config: BatchConfig, arena: Arc<ItemArena>) -> Self {
        Self {
            config,
            arena,
            tracker: Arc::new(BatchTracker::new()),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arc<ItemArena> {
        &self.arena
    }

    /// Live counters, shareable with whoever polls progress.
    pub fn tracker(&self) -> Arc<BatchTracker> {
        self.tracker.clone()
    }

    pub fn progress(&self) -> BatchProgress {
        self.tracker.snapshot()
    }

    /// Processes `ids` until the queue drains or the session cap is reached.
    ///
    /// In-flight items always run to completion; the cap only stops new
    /// admissions. Ids that are unknown or not `idle` are skipped.
    pub async fn run<P>(&self, ids: Vec<String>, processor: Arc<P>) -> BatchSummary
    where
        P: ItemProcessor + ?Sized + 'static,
    {
        let limit = self.config.concurrency_limit.max(1);
        let cap = self.config.session_cap;
        let total = ids.len();

        let mut queue: VecDeque<String> = ids.into();
        let mut tasks: JoinSet<(String, Result<ItemOutcome, Box<dyn Any + Send>>)> =
            JoinSet::new();
        let mut admitted = 0usize;
        let mut skipped = 0usize;
        let mut results: Vec<ItemResult> = Vec::with_capacity(total.min(cap));

        self.tracker.start(total);
        info!(
            "Starting batch: {} items, concurrency {}, session cap {}",
            total, limit, cap
        );

        loop {
            while tasks.len() < limit && admitted < cap {
                let Some(id) = queue.pop_front() else {
                    break;
                };

                if let Err(e) = self.arena.transition(&id, ItemStatus::Pending).await {
                    debug!("Skipping {}: {}", id, e);
                    skipped += 1;
                    continue;
                }
                let Some(item) = self.arena.get(&id).await else {
                    skipped += 1;
                    continue;
                };

                admitted += 1;
                self.tracker.admitted();
                metrics::BATCH_IN_FLIGHT.inc();

                let processor = processor.clone();
                tasks.spawn(async move {
                    let outcome = AssertUnwindSafe(processor.process(item))
                        .catch_unwind()
                        .await;
                    (id, outcome)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            metrics::BATCH_IN_FLIGHT.dec();

            let (id, outcome) = match joined {
                Ok((id, Ok(outcome))) => (id, outcome),
                Ok((id, Err(panic))) => {
                    let message =
                        format!("processing panicked: {}", panic_message(panic.as_ref()));
                    error!("Item {} {}", id, message);
                    (id, ItemOutcome::failed(message))
                }
                Err(e) => {
                    // Only reachable if the task was aborted; the item id is lost with it.
                    error!("Batch task failed to complete: {}", e);
                    self.tracker.completed(false);
                    continue;
                }
            };

            results.push(self.complete(&id, outcome).await);
        }

        let remaining_queued = queue.len();
        let cap_reached = remaining_queued > 0;
        if cap_reached {
            metrics::SESSION_CAP_HITS.inc();
            warn!(
                "Session cap of {} reached, {} items remain queued",
                cap, remaining_queued
            );
        }

        let processed: HashSet<&str> = results.iter().map(|r| r.item_id.as_str()).collect();
        let snapshot = self.arena.snapshot().await;
        let classification =
            ClassificationCounts::tally(snapshot.iter().filter(|i| processed.contains(i.id.as_str())));

        let progress = self.tracker.snapshot();
        self.tracker.finish();

        info!(
            "Batch finished: {} succeeded, {} failed, {} remaining",
            progress.succeeded, progress.failed, remaining_queued
        );

        BatchSummary {
            total,
            completed: progress.completed,
            succeeded: progress.succeeded,
            failed: progress.failed,
            remaining_queued,
            skipped,
            session_cap: cap,
            cap_reached,
            items: results,
            classification,
        }
    }

    /// Applies an outcome to the item with the given id.
    async fn complete(&self, id: &str, outcome: ItemOutcome) -> ItemResult {
        let status = if outcome.success {
            ItemStatus::Success
        } else {
            ItemStatus::Error
        };

        let discovered = &outcome.discovered;
        if let Err(e) = self.arena.update(id, |item| item.apply(discovered)).await {
            warn!("Could not apply results to {}: {}", id, e);
        }
        if let Err(e) = self.arena.transition(id, status).await {
            warn!("Could not mark {} as {}: {}", id, status, e);
        }

        self.tracker.completed(outcome.success);
        metrics::BATCH_ITEMS
            .with_label_values(&[if outcome.success { "success" } else { "error" }])
            .inc();
        debug!("Item {} finished: {} ({})", id, status, outcome.message);

        ItemResult {
            item_id: id.to_string(),
            status,
            message: outcome.message,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Succeeds for ids listed in `succeed`, sleeps a little, and tracks the
    /// highest number of concurrent calls.
    struct CountingProcessor {
        succeed: HashSet<String>,
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingProcessor {
        fn new(succeed: impl IntoIterator<Item = String>, delay: Duration) -> Self {
            Self {
                succeed: succeed.into_iter().collect(),
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl ItemProcessor for CountingProcessor {
        async fn process(&self, item: WorkItem) -> ItemOutcome {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.current.fetch_sub(1, Ordering::SeqCst);
            if self.succeed.contains(&item.id) {
                ItemOutcome {
                    success: true,
                    message: "ok".to_string(),
                    discovered: Default::default(),
                }
            } else {
                ItemOutcome::failed("nope")
            }
        }
    }

    struct PanickingProcessor;

    #[async_trait]
    impl ItemProcessor for PanickingProcessor {
        async fn process(&self, item: WorkItem) -> ItemOutcome {
            if item.id == "item-1" {
                panic!("boom");
            }
            ItemOutcome {
                success: true,
                message: "ok".to_string(),
                discovered: Default::default(),
            }
        }
    }

    fn setup(count: usize, config: BatchConfig) -> (BatchScheduler, Vec<String>) {
        let items = fixtures::items(count);
        let ids = items.iter().map(|i| i.id.clone()).collect();
        let arena = Arc::new(ItemArena::from_items(items));
        (BatchScheduler::new(config, arena), ids)
    }

    #[tokio::test]
    async fn test_drains_queue_under_cap() {
        let (scheduler, ids) = setup(12, BatchConfig::default());
        let processor = Arc::new(CountingProcessor::new(ids.clone(), Duration::from_millis(5)));

        let summary = scheduler.run(ids, processor.clone()).await;

        assert_eq!(summary.total, 12);
        assert_eq!(summary.completed, 12);
        assert_eq!(summary.succeeded, 12);
        assert_eq!(summary.remaining_queued, 0);
        assert!(!summary.cap_reached);
        assert!(summary.notice().is_none());
        assert!(processor.peak.load(Ordering::SeqCst) <= 5);
        assert!(scheduler.progress().finished);
    }

    #[tokio::test]
    async fn test_session_cap_stops_admission() {
        let config = BatchConfig::default()
            .with_concurrency_limit(5)
            .with_session_cap(10);
        let (scheduler, ids) = setup(25, config);
        let processor = Arc::new(CountingProcessor::new(ids.clone(), Duration::from_millis(2)));

        let summary = scheduler.run(ids, processor.clone()).await;

        assert_eq!(summary.completed, 10);
        assert_eq!(summary.remaining_queued, 15);
        assert!(summary.cap_reached);
        assert!(summary.notice().is_some());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 10);

        // The first 10 ids in admission order were processed, the rest stay idle.
        let arena = scheduler.arena();
        assert_eq!(arena.status_of("item-9").await, Some(ItemStatus::Success));
        assert_eq!(arena.status_of("item-10").await, Some(ItemStatus::Idle));
    }

    #[tokio::test]
    async fn test_concurrency_bound_holds() {
        let config = BatchConfig::default().with_concurrency_limit(3);
        let (scheduler, ids) = setup(20, config);
        let processor = Arc::new(CountingProcessor::new(ids.clone(), Duration::from_millis(10)));

        scheduler.run(ids, processor.clone()).await;

        let peak = processor.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {} exceeded limit", peak);
        assert!(scheduler.tracker().peak_in_flight() <= 3);
    }

    #[tokio::test]
    async fn test_each_item_gets_its_own_outcome() {
        let (scheduler, ids) = setup(30, BatchConfig::default().with_concurrency_limit(7));
        let succeed: Vec<String> = ids.iter().step_by(2).cloned().collect();
        let processor = Arc::new(CountingProcessor::new(succeed.clone(), Duration::from_millis(3)));

        let summary = scheduler.run(ids.clone(), processor).await;
        assert_eq!(summary.succeeded, 15);
        assert_eq!(summary.failed, 15);

        for id in &ids {
            let expected = if succeed.contains(id) {
                ItemStatus::Success
            } else {
                ItemStatus::Error
            };
            assert_eq!(scheduler.arena().status_of(id).await, Some(expected), "{}", id);
        }
    }

    #[tokio::test]
    async fn test_panicking_item_is_isolated() {
        let (scheduler, ids) = setup(4, BatchConfig::default());

        let summary = scheduler.run(ids, Arc::new(PanickingProcessor)).await;

        assert_eq!(summary.completed, 4);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        let failed = summary.items.iter().find(|r| r.item_id == "item-1").unwrap();
        assert_eq!(failed.status, ItemStatus::Error);
        assert!(failed.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_non_idle_and_unknown_ids_are_skipped() {
        let (scheduler, mut ids) = setup(3, BatchConfig::default());
        scheduler
            .arena()
            .transition("item-0", ItemStatus::Pending)
            .await
            .unwrap();
        ids.push("ghost".to_string());
        ids.push("item-2".to_string());

        let processor = Arc::new(CountingProcessor::new(ids.clone(), Duration::ZERO));
        let summary = scheduler.run(ids, processor.clone()).await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.skipped, 3);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 2);
    }
}
