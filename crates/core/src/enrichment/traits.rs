use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{CapabilityError, PersistError, ResolveError};
use super::types::{
    ContentExtraction, Narrative, PricingInfo, ReachabilityReport, VisualDiscovery,
};
use crate::item::ItemUpdate;

/// Probes a URL and reports its HTTP status and redirect chain.
#[async_trait]
pub trait ReachabilityChecker: Send + Sync {
    /// Returns the name of this checker implementation.
    fn name(&self) -> &str;

    /// Probes the URL.
    ///
    /// Connectivity failures (DNS, refused connection, timeout) are reported
    /// inside the returned report, not as an `Err`; `Err` means the check
    /// itself could not be run.
    async fn check(&self, url: &str) -> Result<ReachabilityReport, CapabilityError>;
}

/// Captures a screenshot and discovers social profiles for a site.
#[async_trait]
pub trait VisualDiscoverer: Send + Sync {
    fn name(&self) -> &str;

    async fn discover(&self, url: &str) -> Result<VisualDiscovery, CapabilityError>;
}

/// Crawls a site (and optionally its social profiles) for a description.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(
        &self,
        url: &str,
        social_links: &BTreeMap<String, String>,
    ) -> Result<ContentExtraction, CapabilityError>;
}

/// Detects the pricing model of a tool.
#[async_trait]
pub trait PricingExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract_pricing(&self, url: &str) -> Result<PricingInfo, CapabilityError>;
}

/// Generates a long-form description from a site and its short description.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        url: &str,
        description: Option<&str>,
    ) -> Result<Narrative, CapabilityError>;
}

/// Writes enrichment results back to the item's backing record.
#[async_trait]
pub trait ItemPersister: Send + Sync {
    async fn persist(&self, item_id: &str, update: &ItemUpdate) -> Result<(), PersistError>;
}

/// Resolves an item id to its human-readable name.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_name(&self, item_id: &str) -> Result<String, ResolveError>;
}

/// The full set of collaborators a pipeline run needs.
#[derive(Clone)]
pub struct Capabilities {
    pub reachability: Arc<dyn ReachabilityChecker>,
    pub discovery: Arc<dyn VisualDiscoverer>,
    pub content: Arc<dyn ContentExtractor>,
    pub pricing: Arc<dyn PricingExtractor>,
    pub narrative: Arc<dyn NarrativeGenerator>,
    pub persister: Arc<dyn ItemPersister>,
    pub names: Arc<dyn NameResolver>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("reachability", &self.reachability.name())
            .field("discovery", &self.discovery.name())
            .field("content", &self.content.name())
            .field("pricing", &self.pricing.name())
            .field("narrative", &self.narrative.name())
            .field("persister", &"<dyn ItemPersister>")
            .field("names", &"<dyn NameResolver>")
            .finish()
    }
}
