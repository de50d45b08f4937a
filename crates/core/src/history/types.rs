use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineRun, StageKind, StageStatus};

/// Per-stage projection kept in run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: u8,
    pub name: String,
    pub status: StageStatus,
    pub message: String,
}

/// A stored run history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHistoryRecord {
    /// Set by the store on insert.
    #[serde(default)]
    pub id: i64,
    pub item_id: String,
    pub item_name: String,
    pub stages: Vec<StageSummary>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub overall_success: bool,
}

impl RunHistoryRecord {
    /// Simplified projection of a run: stage status and message only.
    pub fn from_run(item_id: &str, item_name: &str, run: &PipelineRun) -> Self {
        let stages = run
            .stages
            .iter()
            .map(|(index, result)| StageSummary {
                stage: *index,
                name: StageKind::from_index(*index)
                    .map(|k| k.label().to_string())
                    .unwrap_or_else(|| format!("Stage {}", index)),
                status: result.status,
                message: result.message.clone(),
            })
            .collect();

        Self {
            id: 0,
            item_id: item_id.to_string(),
            item_name: item_name.to_string(),
            stages,
            start_time: run.start_time,
            end_time: run.end_time,
            overall_success: run.overall_success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageResult;
    use std::collections::BTreeMap;

    #[test]
    fn test_projection_drops_stage_data() {
        let mut stages = BTreeMap::new();
        stages.insert(
            1,
            StageResult::success("HTTP 200", serde_json::json!({ "http_code": 200 })),
        );
        stages.insert(2, StageResult::cancelled());
        let run = PipelineRun::finish(stages, Utc::now());

        let record = RunHistoryRecord::from_run("t1", "Acme", &run);

        assert_eq!(record.stages.len(), 2);
        assert_eq!(record.stages[0].name, "Reachability Validation");
        assert_eq!(record.stages[0].status, StageStatus::Success);
        assert_eq!(record.stages[1].status, StageStatus::Error);
        assert!(!record.overall_success);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["stages"][0].get("data").is_none());
    }
}
