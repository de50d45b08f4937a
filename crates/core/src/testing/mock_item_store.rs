//! In-memory item store for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use crate::enrichment::{ItemPersister, NameResolver, PersistError, ResolveError};
use crate::item::{ItemStore, ItemUpdate, StoreError, ToolEntry, ToolRecord};

/// In-memory [`ItemStore`] that also acts as persister and name resolver.
///
/// Persisted updates are recorded per item even when no record exists, so
/// stage tests can assert on writes without registering tools first.
#[derive(Debug, Default)]
pub struct MockItemStore {
    records: RwLock<Vec<ToolRecord>>,
    updates: RwLock<HashMap<String, ItemUpdate>>,
    fail_persist: AtomicBool,
    name_failures: AtomicU32,
    name_lookups: AtomicU32,
}

impl MockItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(entries: impl IntoIterator<Item = ToolEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            store.insert(&entry);
        }
        store
    }

    /// Merged persisted update for an item, if anything was written.
    pub fn get_update(&self, id: &str) -> Option<ItemUpdate> {
        self.updates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Number of items that received at least one write.
    pub fn updated_count(&self) -> usize {
        self.updates.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Makes every subsequent persist fail.
    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` name lookups fail.
    pub fn fail_name_lookups(&self, count: u32) {
        self.name_failures.store(count, Ordering::SeqCst);
    }

    pub fn name_lookup_count(&self) -> u32 {
        self.name_lookups.load(Ordering::SeqCst)
    }

    fn insert(&self, entry: &ToolEntry) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = records.iter_mut().find(|r| r.id == entry.id) {
            existing.slug = entry.slug.clone();
            existing.name = entry.name.clone();
            existing.url = entry.url.clone();
            existing.updated_at = Utc::now();
            return;
        }
        records.push(ToolRecord {
            id: entry.id.clone(),
            slug: entry.slug.clone(),
            name: entry.name.clone(),
            url: entry.url.clone(),
            http_code: None,
            http_chain: None,
            asset_url: None,
            social_links: BTreeMap::new(),
            has_affiliate_program: None,
            affiliate_url: None,
            description: None,
            pricing_type: None,
            pricing_details: None,
            detailed_description: None,
            updated_at: Utc::now(),
        });
    }
}

impl ItemStore for MockItemStore {
    fn upsert(&self, entry: &ToolEntry) -> Result<(), StoreError> {
        self.insert(entry);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ToolRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn list_items(&self) -> Result<Vec<ToolRecord>, StoreError> {
        Ok(self.records.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn apply_update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(update);
        Ok(())
    }
}

#[async_trait]
impl ItemPersister for MockItemStore {
    async fn persist(&self, item_id: &str, update: &ItemUpdate) -> Result<(), PersistError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(PersistError::Storage("simulated write failure".to_string()));
        }

        self.updates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(item_id.to_string())
            .or_default()
            .merge(update.clone());

        // Unknown ids are fine here; only the recorded update matters.
        let _ = self.apply_update(item_id, update);
        Ok(())
    }
}

#[async_trait]
impl NameResolver for MockItemStore {
    async fn resolve_name(&self, item_id: &str) -> Result<String, ResolveError> {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);

        let pending_failures = self.name_failures.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.name_failures.store(pending_failures - 1, Ordering::SeqCst);
            return Err(ResolveError::Lookup("simulated lookup failure".to_string()));
        }

        match self.get(item_id) {
            Ok(Some(record)) => Ok(record.name),
            _ => Err(ResolveError::NotFound(item_id.to_string())),
        }
    }
}
