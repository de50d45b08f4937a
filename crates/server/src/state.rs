use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use curator_core::{
    scheduler::BatchTracker, BatchMode, BatchSummary, Config, HistoryStore, ItemArena, ItemStatus,
    ItemStore, PipelineRunner, SanitizedConfig, WorkItem,
};

/// Shared application state
pub struct AppState {
    config: Config,
    item_store: Arc<dyn ItemStore>,
    history_store: Arc<dyn HistoryStore>,
    runner: Arc<PipelineRunner>,
    batches: BatchRegistry,
}

impl AppState {
    pub fn new(
        config: Config,
        item_store: Arc<dyn ItemStore>,
        history_store: Arc<dyn HistoryStore>,
        runner: Arc<PipelineRunner>,
    ) -> Self {
        let batches = BatchRegistry::new(config.server.retained_batches);
        Self {
            config,
            item_store,
            history_store,
            runner,
            batches,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn item_store(&self) -> &Arc<dyn ItemStore> {
        &self.item_store
    }

    pub fn history_store(&self) -> &Arc<dyn HistoryStore> {
        &self.history_store
    }

    pub fn runner(&self) -> &Arc<PipelineRunner> {
        &self.runner
    }

    pub fn batches(&self) -> &BatchRegistry {
        &self.batches
    }
}

/// A batch started through the API.
///
/// While running, the arena and tracker are shared with the scheduler, so
/// reads see live progress. [`BatchHandle::finish`] keeps only the items the
/// batch touched and releases the arena.
pub struct BatchHandle {
    pub id: String,
    pub mode: BatchMode,
    pub created_at: DateTime<Utc>,
    pub tracker: Arc<BatchTracker>,
    state: RwLock<BatchState>,
    finished: AtomicBool,
}

enum BatchState {
    Running(Arc<ItemArena>),
    Finished {
        summary: BatchSummary,
        items: Vec<WorkItem>,
    },
}

impl BatchHandle {
    pub fn new(
        id: String,
        mode: BatchMode,
        arena: Arc<ItemArena>,
        tracker: Arc<BatchTracker>,
    ) -> Self {
        Self {
            id,
            mode,
            created_at: Utc::now(),
            tracker,
            state: RwLock::new(BatchState::Running(arena)),
            finished: AtomicBool::new(false),
        }
    }

    /// Items that left `idle` during the batch, in arena order.
    pub async fn touched_items(&self) -> Vec<WorkItem> {
        match &*self.state.read().await {
            BatchState::Running(arena) => touched(arena).await,
            BatchState::Finished { items, .. } => items.clone(),
        }
    }

    pub async fn summary(&self) -> Option<BatchSummary> {
        match &*self.state.read().await {
            BatchState::Running(_) => None,
            BatchState::Finished { summary, .. } => Some(summary.clone()),
        }
    }

    /// Stores the summary and drops the arena.
    pub async fn finish(&self, summary: BatchSummary) {
        let mut state = self.state.write().await;
        let items = match &*state {
            BatchState::Running(arena) => touched(arena).await,
            BatchState::Finished { items, .. } => items.clone(),
        };
        *state = BatchState::Finished { summary, items };
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

async fn touched(arena: &ItemArena) -> Vec<WorkItem> {
    arena
        .snapshot()
        .await
        .into_iter()
        .filter(|item| item.status != ItemStatus::Idle)
        .collect()
}

/// Batches keyed by id.
///
/// Keeps at most `retain_finished` finished batches; the oldest are evicted
/// first. Running batches are never evicted.
pub struct BatchRegistry {
    retain_finished: usize,
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    batches: HashMap<String, Arc<BatchHandle>>,
    /// Ids in insertion order.
    order: VecDeque<String>,
}

impl BatchRegistry {
    pub fn new(retain_finished: usize) -> Self {
        Self {
            retain_finished,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    pub async fn insert(&self, handle: Arc<BatchHandle>) {
        {
            let mut inner = self.inner.write().await;
            inner.order.push_back(handle.id.clone());
            inner.batches.insert(handle.id.clone(), handle);
        }
        self.prune().await;
    }

    pub async fn get(&self, id: &str) -> Option<Arc<BatchHandle>> {
        self.inner.read().await.batches.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.batches.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evicts the oldest finished batches beyond the retention limit.
    /// Returns how many were dropped.
    pub async fn prune(&self) -> usize {
        let mut inner = self.inner.write().await;
        let RegistryInner { batches, order } = &mut *inner;

        let finished = batches.values().filter(|b| b.is_finished()).count();
        let mut excess = finished.saturating_sub(self.retain_finished);
        if excess == 0 {
            return 0;
        }

        let evicted = excess;
        order.retain(|id| {
            let evict = excess > 0 && batches.get(id).is_some_and(|b| b.is_finished());
            if evict {
                batches.remove(id);
                excess -= 1;
            }
            !evict
        });
        debug!("Evicted {} finished batches", evicted);
        evicted
    }

    /// Number of running and finished batches.
    pub async fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        let finished = inner.batches.values().filter(|b| b.is_finished()).count();
        (inner.batches.len() - finished, finished)
    }
}
