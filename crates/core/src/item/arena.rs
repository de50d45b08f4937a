//! Id-keyed storage for the items of one run.

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::classify::ClassificationCounts;

use super::types::{ItemStatus, WorkItem};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ItemStatus,
        to: ItemStatus,
    },
}

#[derive(Debug, Default)]
struct ArenaInner {
    items: HashMap<String, WorkItem>,
    /// Insertion order, used only for snapshots.
    order: Vec<String>,
}

/// Items of one run, keyed by id.
///
/// Tasks locate an item by id on every access; positions in `snapshot()` are
/// for display only and must not be used to address an item later.
#[derive(Debug, Default)]
pub struct ItemArena {
    inner: RwLock<ArenaInner>,
}

impl ItemArena {
    /// Builds an arena. A repeated id replaces the earlier item but keeps its
    /// original position.
    pub fn from_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        let mut inner = ArenaInner::default();
        for item in items {
            if !inner.items.contains_key(&item.id) {
                inner.order.push(item.id.clone());
            }
            inner.items.insert(item.id.clone(), item);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.items.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.items.contains_key(id)
    }

    pub async fn get(&self, id: &str) -> Option<WorkItem> {
        self.inner.read().await.items.get(id).cloned()
    }

    pub async fn status_of(&self, id: &str) -> Option<ItemStatus> {
        self.inner.read().await.items.get(id).map(|item| item.status)
    }

    /// All items in insertion order.
    pub async fn snapshot(&self) -> Vec<WorkItem> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id).cloned())
            .collect()
    }

    /// Mutates the item with the given id.
    ///
    /// `f` must not change `WorkItem::id`.
    pub async fn update<F, R>(&self, id: &str, f: F) -> Result<R, ArenaError>
    where
        F: FnOnce(&mut WorkItem) -> R,
    {
        let mut inner = self.inner.write().await;
        let item = inner
            .items
            .get_mut(id)
            .ok_or_else(|| ArenaError::NotFound(id.to_string()))?;
        Ok(f(item))
    }

    /// Moves an item to `next`, rejecting transitions outside
    /// `idle -> pending -> {success, error}`.
    pub async fn transition(&self, id: &str, next: ItemStatus) -> Result<(), ArenaError> {
        let mut inner = self.inner.write().await;
        let item = inner
            .items
            .get_mut(id)
            .ok_or_else(|| ArenaError::NotFound(id.to_string()))?;

        if !item.status.can_transition_to(next) {
            return Err(ArenaError::InvalidTransition {
                id: id.to_string(),
                from: item.status,
                to: next,
            });
        }

        item.status = next;
        Ok(())
    }

    /// Puts every item back to `idle` so the arena can seed a new run.
    pub async fn reset_statuses(&self) {
        let mut inner = self.inner.write().await;
        for item in inner.items.values_mut() {
            item.status = ItemStatus::Idle;
        }
    }

    pub async fn classification_counts(&self) -> ClassificationCounts {
        let inner = self.inner.read().await;
        ClassificationCounts::tally(inner.items.values())
    }
}
