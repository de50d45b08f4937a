//! Work selection: turning a collection of items into an ordered work list.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

use crate::classify::{classify, AssetBucket, Classification, ReachabilityBucket};
use crate::item::WorkItem;

/// No item matched the selection. Callers decide whether this is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("selection matched no items")]
pub struct EmptySelection;

/// Which buckets (and optionally which ids) a run covers.
///
/// An item is selected when its reachability bucket AND its asset bucket are
/// both included, and, if `ids` is set, its id is in `ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSelection {
    #[serde(default = "all_reachability")]
    pub reachability: BTreeSet<ReachabilityBucket>,
    #[serde(default = "all_assets")]
    pub asset: BTreeSet<AssetBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<HashSet<String>>,
}

fn all_reachability() -> BTreeSet<ReachabilityBucket> {
    ReachabilityBucket::ALL.into_iter().collect()
}

fn all_assets() -> BTreeSet<AssetBucket> {
    AssetBucket::ALL.into_iter().collect()
}

impl Default for RunSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl RunSelection {
    /// Every bucket included, no id restriction.
    pub fn all() -> Self {
        Self {
            reachability: all_reachability(),
            asset: all_assets(),
            ids: None,
        }
    }

    /// Nothing included.
    pub fn none() -> Self {
        Self {
            reachability: BTreeSet::new(),
            asset: BTreeSet::new(),
            ids: None,
        }
    }

    pub fn with_reachability(mut self, buckets: impl IntoIterator<Item = ReachabilityBucket>) -> Self {
        self.reachability = buckets.into_iter().collect();
        self
    }

    pub fn with_assets(mut self, buckets: impl IntoIterator<Item = AssetBucket>) -> Self {
        self.asset = buckets.into_iter().collect();
        self
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Toggles one reachability bucket.
    pub fn set_reachability(&mut self, bucket: ReachabilityBucket, included: bool) {
        if included {
            self.reachability.insert(bucket);
        } else {
            self.reachability.remove(&bucket);
        }
    }

    /// Toggles one asset bucket.
    pub fn set_asset(&mut self, bucket: AssetBucket, included: bool) {
        if included {
            self.asset.insert(bucket);
        } else {
            self.asset.remove(&bucket);
        }
    }

    pub fn accepts_classification(&self, class: &Classification) -> bool {
        self.reachability.contains(&class.reachability) && self.asset.contains(&class.asset)
    }

    pub fn accepts(&self, item: &WorkItem) -> bool {
        let id_ok = self.ids.as_ref().map_or(true, |ids| ids.contains(&item.id));
        id_ok && self.accepts_classification(&classify(item))
    }
}

/// Ids of the accepted items, in input order.
pub fn select<'a>(
    items: impl IntoIterator<Item = &'a WorkItem>,
    selection: &RunSelection,
) -> Result<Vec<String>, EmptySelection> {
    let ids: Vec<String> = items
        .into_iter()
        .filter(|item| selection.accepts(item))
        .map(|item| item.id.clone())
        .collect();

    if ids.is_empty() {
        Err(EmptySelection)
    } else {
        Ok(ids)
    }
}
