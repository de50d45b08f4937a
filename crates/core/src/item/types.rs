//! Work item types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enrichment::PricingType;

/// Per-run processing status of a work item.
///
/// Only `Idle -> Pending`, `Pending -> Success` and `Pending -> Error` are
/// valid transitions within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Idle => "idle",
            ItemStatus::Pending => "pending",
            ItemStatus::Success => "success",
            ItemStatus::Error => "error",
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Idle, ItemStatus::Pending)
                | (ItemStatus::Pending, ItemStatus::Success)
                | (ItemStatus::Pending, ItemStatus::Error)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Error)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One directory entry being processed in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub slug: String,
    pub url: String,
    #[serde(default)]
    pub status: ItemStatus,
    /// Last observed HTTP status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    /// Last observed redirect chain, or `"DNS"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_chain: Option<String>,
    /// Screenshot URL, if one has been captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, slug: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            url: url.into(),
            status: ItemStatus::Idle,
            http_code: None,
            http_chain: None,
            asset_url: None,
        }
    }

    pub fn with_http(mut self, code: Option<u16>, chain: Option<&str>) -> Self {
        self.http_code = code;
        self.http_chain = chain.map(String::from);
        self
    }

    pub fn with_asset(mut self, asset_url: impl Into<String>) -> Self {
        self.asset_url = Some(asset_url.into());
        self
    }

    /// Copies the fields of `update` that the run tracks onto this item.
    ///
    /// Reachability fields are replaced together so a stale code never
    /// survives next to a fresh chain.
    pub fn apply(&mut self, update: &ItemUpdate) {
        if update.touches_reachability() {
            self.http_code = update.http_code;
            self.http_chain = update.http_chain.clone();
        }
        if let Some(ref asset_url) = update.asset_url {
            self.asset_url = Some(asset_url.clone());
        }
    }
}

/// Fields written back to an item's backing record.
///
/// `None` means "leave unchanged", except for the reachability pair once
/// `reachability_checked` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    /// A reachability check ran. `http_code`/`http_chain` then overwrite the
    /// stored pair even when both are `None`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reachability_checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_links: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_affiliate_program: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_type: Option<PricingType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ItemUpdate::default()
    }

    /// Whether this update writes the reachability pair.
    pub fn touches_reachability(&self) -> bool {
        self.reachability_checked || self.http_code.is_some() || self.http_chain.is_some()
    }

    /// Overlays the set fields of `other` onto `self`.
    pub fn merge(&mut self, other: ItemUpdate) {
        if other.touches_reachability() {
            self.reachability_checked |= other.reachability_checked;
            self.http_code = other.http_code;
            self.http_chain = other.http_chain;
        }
        if other.asset_url.is_some() {
            self.asset_url = other.asset_url;
        }
        if other.social_links.is_some() {
            self.social_links = other.social_links;
        }
        if other.has_affiliate_program.is_some() {
            self.has_affiliate_program = other.has_affiliate_program;
        }
        if other.affiliate_url.is_some() {
            self.affiliate_url = other.affiliate_url;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.pricing_type.is_some() {
            self.pricing_type = other.pricing_type;
        }
        if other.pricing_details.is_some() {
            self.pricing_details = other.pricing_details;
        }
        if other.detailed_description.is_some() {
            self.detailed_description = other.detailed_description;
        }
    }
}
