//! Pipeline runner.

use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::enrichment::Capabilities;
use crate::history::RunHistoryRecorder;
use crate::item::{ItemUpdate, WorkItem};
use crate::metrics;

use super::retry::RetryPolicy;
use super::stages::{execute_stage, StageInputs};
use super::types::{PipelineReport, PipelineRun, StageKind, StageResult, StageStatus};

/// Name recorded in history when the item's name cannot be resolved.
pub const UNKNOWN_ITEM_NAME: &str = "Unknown";

/// Runs the five enrichment stages for one item.
///
/// Stage 1 failing cancels stages 2..5. Any other stage failure is contained
/// to that stage. Every run is recorded in history when a recorder is set;
/// recording failures are logged and never change the run's outcome.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    capabilities: Capabilities,
    history: Option<RunHistoryRecorder>,
    retry: RetryPolicy,
}

impl PipelineRunner {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            history: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the recorder that receives every finished run.
    pub fn with_history(mut self, recorder: RunHistoryRecorder) -> Self {
        self.history = Some(recorder);
        self
    }

    /// Sets the retry policy for item name resolution.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Runs the full pipeline for an item.
    pub async fn run(&self, item: &WorkItem) -> PipelineReport {
        let start_time = Utc::now();
        let started = Instant::now();
        let mut stages: BTreeMap<u8, StageResult> = BTreeMap::new();
        let mut discovered = ItemUpdate::default();
        let mut inputs = StageInputs::default();

        info!("Starting pipeline for {} ({})", item.id, item.url);

        for kind in StageKind::ALL {
            let output = execute_stage(&self.capabilities, kind, item, &inputs).await;
            metrics::STAGE_RESULTS
                .with_label_values(&[kind.as_str(), output.result.status.as_str()])
                .inc();

            if output.result.is_success() {
                match kind {
                    StageKind::VisualDiscovery => {
                        if let Some(ref links) = output.discovered.social_links {
                            inputs.social_links = links.clone();
                        }
                    }
                    StageKind::ContentExtraction => {
                        inputs.description = output.discovered.description.clone();
                    }
                    _ => {}
                }
            }

            let failed_gate =
                kind == StageKind::Reachability && output.result.status == StageStatus::Error;
            discovered.merge(output.discovered);
            stages.insert(kind.index(), output.result);

            if failed_gate {
                debug!("Reachability failed for {}, cancelling remaining stages", item.id);
                for cancelled in &StageKind::ALL[1..] {
                    stages.insert(cancelled.index(), StageResult::cancelled());
                    metrics::STAGE_RESULTS
                        .with_label_values(&[cancelled.as_str(), StageStatus::Error.as_str()])
                        .inc();
                }
                break;
            }
        }

        let run = PipelineRun::finish(stages, start_time);
        metrics::PIPELINE_DURATION.observe(started.elapsed().as_secs_f64());
        metrics::PIPELINE_RUNS
            .with_label_values(&[if run.overall_success { "success" } else { "failure" }])
            .inc();

        info!(
            "Pipeline for {} finished: {}/{} stages succeeded, overall {}",
            item.id,
            run.success_count(),
            StageKind::ALL.len(),
            if run.overall_success { "success" } else { "failure" }
        );

        self.record(item, &run).await;
        PipelineReport { run, discovered }
    }

    /// Runs exactly one stage with default inputs.
    ///
    /// The run holds a single stage entry and succeeds iff that stage did.
    pub async fn run_stage(&self, kind: StageKind, item: &WorkItem) -> PipelineReport {
        let start_time = Utc::now();
        let output = execute_stage(&self.capabilities, kind, item, &StageInputs::default()).await;
        metrics::STAGE_RESULTS
            .with_label_values(&[kind.as_str(), output.result.status.as_str()])
            .inc();

        let overall_success = output.result.is_success();
        let mut stages = BTreeMap::new();
        stages.insert(kind.index(), output.result);

        let run = PipelineRun {
            stages,
            start_time,
            end_time: Utc::now(),
            overall_success,
        };

        self.record(item, &run).await;
        PipelineReport {
            run,
            discovered: output.discovered,
        }
    }

    /// Resolves the item's display name, retrying per the retry policy and
    /// falling back to [`UNKNOWN_ITEM_NAME`].
    pub async fn resolve_item_name(&self, item_id: &str) -> String {
        let result = self
            .retry
            .run("name resolution", |attempt| {
                if attempt > 1 {
                    metrics::NAME_RESOLUTION_RETRIES.inc();
                }
                let names = self.capabilities.names.clone();
                let item_id = item_id.to_string();
                async move { names.resolve_name(&item_id).await }
            })
            .await;

        match result {
            Ok(name) => name,
            Err(e) => {
                warn!("Could not resolve name for {}: {}", item_id, e);
                UNKNOWN_ITEM_NAME.to_string()
            }
        }
    }

    async fn record(&self, item: &WorkItem, run: &PipelineRun) {
        let Some(ref recorder) = self.history else {
            return;
        };

        let name = self.resolve_item_name(&item.id).await;
        match recorder.record(&item.id, &name, run).await {
            Ok(id) => debug!("Recorded run history {} for {}", id, item.id),
            Err(e) => {
                metrics::HISTORY_WRITE_FAILURES.inc();
                warn!("Failed to record run history for {}: {}", item.id, e);
            }
        }
    }
}
