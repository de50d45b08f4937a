//! Reachability and asset classification of work items.
//!
//! Every item falls into exactly one [`ReachabilityBucket`] and exactly one
//! [`AssetBucket`]. Both functions are pure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enrichment::DNS_CHAIN;
use crate::item::WorkItem;

/// Reachability class derived from the last HTTP check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReachabilityBucket {
    #[serde(rename = "dns-error")]
    DnsError,
    #[serde(rename = "success-2xx")]
    Success2xx,
    #[serde(rename = "redirect-3xx")]
    Redirect3xx,
    #[serde(rename = "client-error-4xx")]
    ClientError4xx,
    #[serde(rename = "server-error-5xx")]
    ServerError5xx,
    #[serde(rename = "unchecked")]
    Unchecked,
}

impl ReachabilityBucket {
    pub const ALL: [ReachabilityBucket; 6] = [
        ReachabilityBucket::DnsError,
        ReachabilityBucket::Success2xx,
        ReachabilityBucket::Redirect3xx,
        ReachabilityBucket::ClientError4xx,
        ReachabilityBucket::ServerError5xx,
        ReachabilityBucket::Unchecked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReachabilityBucket::DnsError => "dns-error",
            ReachabilityBucket::Success2xx => "success-2xx",
            ReachabilityBucket::Redirect3xx => "redirect-3xx",
            ReachabilityBucket::ClientError4xx => "client-error-4xx",
            ReachabilityBucket::ServerError5xx => "server-error-5xx",
            ReachabilityBucket::Unchecked => "unchecked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == s)
    }
}

/// Whether a screenshot has been captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetBucket {
    HasAsset,
    MissingAsset,
}

impl AssetBucket {
    pub const ALL: [AssetBucket; 2] = [AssetBucket::HasAsset, AssetBucket::MissingAsset];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetBucket::HasAsset => "has-asset",
            AssetBucket::MissingAsset => "missing-asset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == s)
    }
}

/// The pair of buckets an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub reachability: ReachabilityBucket,
    pub asset: AssetBucket,
}

/// Classifies an item.
pub fn classify(item: &WorkItem) -> Classification {
    Classification {
        reachability: classify_reachability(item.http_code, item.http_chain.as_deref()),
        asset: classify_asset(item.asset_url.as_deref()),
    }
}

/// Rules, in order:
/// 1. chain `"DNS"` is a DNS error whatever the code says;
/// 2. no numeric code is unchecked, even when a redirect chain is present;
/// 3. otherwise the code's hundred decides. Codes below 200 carry no
///    reachability verdict and are treated as unchecked.
pub fn classify_reachability(http_code: Option<u16>, http_chain: Option<&str>) -> ReachabilityBucket {
    if http_chain == Some(DNS_CHAIN) {
        return ReachabilityBucket::DnsError;
    }

    match http_code {
        None => ReachabilityBucket::Unchecked,
        Some(code) if code < 200 => ReachabilityBucket::Unchecked,
        Some(code) if code < 300 => ReachabilityBucket::Success2xx,
        Some(code) if code < 400 => ReachabilityBucket::Redirect3xx,
        Some(code) if code < 500 => ReachabilityBucket::ClientError4xx,
        Some(_) => ReachabilityBucket::ServerError5xx,
    }
}

/// Whitespace-only asset URLs count as missing.
pub fn classify_asset(asset_url: Option<&str>) -> AssetBucket {
    match asset_url {
        Some(url) if !url.trim().is_empty() => AssetBucket::HasAsset,
        _ => AssetBucket::MissingAsset,
    }
}

/// Per-bucket tallies over a set of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationCounts {
    pub total: usize,
    pub reachability: BTreeMap<ReachabilityBucket, usize>,
    pub asset: BTreeMap<AssetBucket, usize>,
}

impl ClassificationCounts {
    pub fn tally<'a>(items: impl IntoIterator<Item = &'a WorkItem>) -> Self {
        let mut counts = Self {
            total: 0,
            reachability: ReachabilityBucket::ALL.iter().map(|b| (*b, 0)).collect(),
            asset: AssetBucket::ALL.iter().map(|b| (*b, 0)).collect(),
        };

        for item in items {
            let class = classify(item);
            counts.total += 1;
            *counts.reachability.entry(class.reachability).or_default() += 1;
            *counts.asset.entry(class.asset).or_default() += 1;
        }

        counts
    }

    pub fn reachability(&self, bucket: ReachabilityBucket) -> usize {
        self.reachability.get(&bucket).copied().unwrap_or(0)
    }

    pub fn asset(&self, bucket: AssetBucket) -> usize {
        self.asset.get(&bucket).copied().unwrap_or(0)
    }
}
