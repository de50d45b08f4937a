//! Pipeline run types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::item::ItemUpdate;

/// Message carried by stages 2..5 when stage 1 fails.
pub const CANCELLED_MESSAGE: &str = "cancelled: reachability validation failed";

/// Minimum number of `success` stages for a run to count as successful.
pub const SUCCESS_THRESHOLD: usize = 3;

/// The five enrichment stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Reachability,
    VisualDiscovery,
    ContentExtraction,
    PricingExtraction,
    NarrativeGeneration,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Reachability,
        StageKind::VisualDiscovery,
        StageKind::ContentExtraction,
        StageKind::PricingExtraction,
        StageKind::NarrativeGeneration,
    ];

    /// 1-based position in the pipeline.
    pub fn index(&self) -> u8 {
        match self {
            StageKind::Reachability => 1,
            StageKind::VisualDiscovery => 2,
            StageKind::ContentExtraction => 3,
            StageKind::PricingExtraction => 4,
            StageKind::NarrativeGeneration => 5,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.index() == index)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Reachability => "reachability",
            StageKind::VisualDiscovery => "visual_discovery",
            StageKind::ContentExtraction => "content_extraction",
            StageKind::PricingExtraction => "pricing_extraction",
            StageKind::NarrativeGeneration => "narrative_generation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Human-readable stage name.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Reachability => "Reachability Validation",
            StageKind::VisualDiscovery => "Visual & Social Discovery",
            StageKind::ContentExtraction => "Content Extraction",
            StageKind::PricingExtraction => "Pricing Extraction",
            StageKind::NarrativeGeneration => "Narrative Generation",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// The stage achieved its purpose, persistence included.
    Success,
    /// Usable but incomplete, or not persisted.
    Warning,
    /// The stage did not achieve its purpose.
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Success => "success",
            StageStatus::Warning => "warning",
            StageStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub status: StageStatus,
    pub message: String,
    /// Stage-specific payload; `null` when the stage produced nothing.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl StageResult {
    pub fn success(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: StageStatus::Success,
            message: message.into(),
            data,
        }
    }

    pub fn warning(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: StageStatus::Warning,
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Error,
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn cancelled() -> Self {
        Self::error(CANCELLED_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Success
    }
}

/// One execution of the pipeline for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Stage index (1..5) to result.
    pub stages: BTreeMap<u8, StageResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub overall_success: bool,
}

impl PipelineRun {
    /// Seals a run. `overall_success` is derived from the stage results.
    pub fn finish(stages: BTreeMap<u8, StageResult>, start_time: DateTime<Utc>) -> Self {
        let overall_success = meets_threshold(&stages);
        Self {
            stages,
            start_time,
            end_time: Utc::now(),
            overall_success,
        }
    }

    pub fn stage(&self, kind: StageKind) -> Option<&StageResult> {
        self.stages.get(&kind.index())
    }

    pub fn success_count(&self) -> usize {
        count_successes(&self.stages)
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds().max(0) as f64 / 1000.0
    }
}

fn count_successes(stages: &BTreeMap<u8, StageResult>) -> usize {
    stages.values().filter(|r| r.is_success()).count()
}

/// Whether enough stages succeeded, regardless of which ones.
pub fn meets_threshold(stages: &BTreeMap<u8, StageResult>) -> bool {
    count_successes(stages) >= SUCCESS_THRESHOLD
}

/// A finished run plus everything the stages discovered about the item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub run: PipelineRun,
    /// Merged payload of all stages that produced data, persisted or not.
    pub discovered: ItemUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(statuses: &[StageStatus]) -> BTreeMap<u8, StageResult> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let result = StageResult {
                    status: *status,
                    message: String::new(),
                    data: serde_json::Value::Null,
                };
                ((i + 1) as u8, result)
            })
            .collect()
    }

    #[test]
    fn test_stage_indices() {
        let indices: Vec<u8> = StageKind::ALL.iter().map(|k| k.index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert_eq!(StageKind::from_index(3), Some(StageKind::ContentExtraction));
        assert_eq!(StageKind::from_index(0), None);
        assert_eq!(StageKind::from_index(6), None);
        assert_eq!(StageKind::parse("visual_discovery"), Some(StageKind::VisualDiscovery));
    }

    #[test]
    fn test_threshold_counts_only_successes() {
        use StageStatus::*;

        assert!(meets_threshold(&stages(&[Success, Success, Success, Error, Error])));
        assert!(meets_threshold(&stages(&[Error, Warning, Success, Success, Success])));
        assert!(!meets_threshold(&stages(&[Success, Success, Warning, Warning, Warning])));
        assert!(!meets_threshold(&stages(&[Error, Error, Error, Error, Error])));
    }

    #[test]
    fn test_finish_derives_overall_success() {
        use StageStatus::*;

        let start = Utc::now();
        let run = PipelineRun::finish(stages(&[Success, Success, Warning, Success, Error]), start);
        assert!(run.overall_success);
        assert_eq!(run.success_count(), 3);
        assert!(run.end_time >= run.start_time);

        let run = PipelineRun::finish(stages(&[Success, Warning, Warning, Success, Error]), start);
        assert!(!run.overall_success);
    }

    #[test]
    fn test_stage_result_serialization() {
        let result = StageResult::cancelled();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], CANCELLED_MESSAGE);
    }
}
