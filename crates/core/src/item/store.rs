//! Backing record store for directory items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::enrichment::PricingType;

use super::types::{ItemUpdate, WorkItem};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Minimal data needed to register a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub url: String,
}

/// Full stored record of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub url: String,
    pub http_code: Option<u16>,
    pub http_chain: Option<String>,
    pub asset_url: Option<String>,
    pub social_links: BTreeMap<String, String>,
    pub has_affiliate_program: Option<bool>,
    pub affiliate_url: Option<String>,
    pub description: Option<String>,
    pub pricing_type: Option<PricingType>,
    pub pricing_details: Option<String>,
    pub detailed_description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ToolRecord {
    /// Fresh, idle work item for a new run.
    pub fn to_work_item(&self) -> WorkItem {
        WorkItem {
            id: self.id.clone(),
            slug: self.slug.clone(),
            url: self.url.clone(),
            status: Default::default(),
            http_code: self.http_code,
            http_chain: self.http_chain.clone(),
            asset_url: self.asset_url.clone(),
        }
    }

    /// Applies the set fields of `update` in memory.
    pub fn apply(&mut self, update: &ItemUpdate) {
        if update.touches_reachability() {
            self.http_code = update.http_code;
            self.http_chain = update.http_chain.clone();
        }
        if let Some(ref v) = update.asset_url {
            self.asset_url = Some(v.clone());
        }
        if let Some(ref v) = update.social_links {
            self.social_links = v.clone();
        }
        if update.has_affiliate_program.is_some() {
            self.has_affiliate_program = update.has_affiliate_program;
        }
        if let Some(ref v) = update.affiliate_url {
            self.affiliate_url = Some(v.clone());
        }
        if let Some(ref v) = update.description {
            self.description = Some(v.clone());
        }
        if update.pricing_type.is_some() {
            self.pricing_type = update.pricing_type;
        }
        if let Some(ref v) = update.pricing_details {
            self.pricing_details = Some(v.clone());
        }
        if let Some(ref v) = update.detailed_description {
            self.detailed_description = Some(v.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// Storage for tool records.
pub trait ItemStore: Send + Sync {
    /// Insert a tool, or update slug/name/url of an existing one.
    fn upsert(&self, entry: &ToolEntry) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Result<Option<ToolRecord>, StoreError>;

    /// All tools in insertion order.
    fn list_items(&self) -> Result<Vec<ToolRecord>, StoreError>;

    /// Writes the set fields of `update`. Fails with `NotFound` for an
    /// unknown id.
    fn apply_update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError>;

    /// All tools as fresh work items.
    fn list_work_items(&self) -> Result<Vec<WorkItem>, StoreError> {
        Ok(self.list_items()?.iter().map(ToolRecord::to_work_item).collect())
    }
}
