use std::sync::Arc;

use crate::pipeline::PipelineRun;

use super::{HistoryError, HistoryStore, RunHistoryRecord};

/// Writes a projection of each pipeline run to a [`HistoryStore`].
///
/// Callers treat failures as non-fatal: the run that produced the record has
/// already happened and its outcome stands.
#[derive(Clone)]
pub struct RunHistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl RunHistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Persists the run and returns the assigned id.
    pub async fn record(
        &self,
        item_id: &str,
        item_name: &str,
        run: &PipelineRun,
    ) -> Result<i64, HistoryError> {
        let record = RunHistoryRecord::from_run(item_id, item_name, run);
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || store.insert(&record))
            .await
            .map_err(|e| HistoryError::Database(format!("history writer task failed: {}", e)))?
    }
}

impl std::fmt::Debug for RunHistoryRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHistoryRecorder")
            .field("store", &"<dyn HistoryStore>")
            .finish()
    }
}
