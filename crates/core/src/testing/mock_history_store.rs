//! In-memory history store for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::history::{HistoryError, HistoryFilter, HistoryStore, RunHistoryRecord};

/// Records inserts in memory; can be told to fail every write.
#[derive(Debug, Default)]
pub struct MockHistoryStore {
    records: Mutex<Vec<RunHistoryRecord>>,
    should_fail: AtomicBool,
}

impl MockHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Inserted records, oldest first.
    pub fn records(&self) -> Vec<RunHistoryRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn matching(&self, filter: &HistoryFilter) -> Vec<RunHistoryRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .filter(|r| filter.item_id.as_ref().map_or(true, |id| &r.item_id == id))
            .filter(|r| filter.overall_success.map_or(true, |s| r.overall_success == s))
            .cloned()
            .collect()
    }
}

impl HistoryStore for MockHistoryStore {
    fn insert(&self, record: &RunHistoryRecord) -> Result<i64, HistoryError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(HistoryError::Database("simulated failure".to_string()));
        }

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let id = records.len() as i64 + 1;
        let mut record = record.clone();
        record.id = id;
        records.push(record);
        Ok(id)
    }

    fn query(&self, filter: &HistoryFilter) -> Result<Vec<RunHistoryRecord>, HistoryError> {
        Ok(self
            .matching(filter)
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    fn count(&self, filter: &HistoryFilter) -> Result<i64, HistoryError> {
        Ok(self.matching(filter).len() as i64)
    }
}
