use chrono::{DateTime, Utc};
use thiserror::Error;

use super::RunHistoryRecord;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Filter for querying run history
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub item_id: Option<String>,
    pub overall_success: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_overall_success(mut self, success: bool) -> Self {
        self.overall_success = Some(success);
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Storage for run history records
pub trait HistoryStore: Send + Sync {
    /// Insert a record, returns the assigned ID
    fn insert(&self, record: &RunHistoryRecord) -> Result<i64, HistoryError>;

    /// Newest first
    fn query(&self, filter: &HistoryFilter) -> Result<Vec<RunHistoryRecord>, HistoryError>;

    fn count(&self, filter: &HistoryFilter) -> Result<i64, HistoryError>;
}
