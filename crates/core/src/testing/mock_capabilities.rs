//! Mock enrichment capabilities for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::enrichment::{
    Capabilities, CapabilityError, ContentExtraction, ContentExtractor, Narrative,
    NarrativeGenerator, PricingExtractor, PricingInfo, PricingType, ReachabilityChecker,
    ReachabilityReport, VisualDiscoverer, VisualDiscovery,
};

use super::MockItemStore;

/// Shared scripting for one capability: a default response, per-URL
/// overrides, an optional blanket failure and an artificial delay.
struct Scripted<T> {
    default: RwLock<T>,
    per_url: RwLock<HashMap<String, Result<T, String>>>,
    error: RwLock<Option<String>>,
    delay: RwLock<Duration>,
    calls: RwLock<Vec<String>>,
}

impl<T: Clone> Scripted<T> {
    fn new(default: T) -> Self {
        Self {
            default: RwLock::new(default),
            per_url: RwLock::new(HashMap::new()),
            error: RwLock::new(None),
            delay: RwLock::new(Duration::ZERO),
            calls: RwLock::new(Vec::new()),
        }
    }

    async fn respond(&self, url: &str) -> Result<T, CapabilityError> {
        self.calls.write().await.push(url.to_string());

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(scripted) = self.per_url.read().await.get(url) {
            return scripted.clone().map_err(CapabilityError::Request);
        }
        if let Some(message) = self.error.read().await.clone() {
            return Err(CapabilityError::Request(message));
        }
        Ok(self.default.read().await.clone())
    }

    async fn set_default(&self, value: T) {
        *self.default.write().await = value;
    }

    async fn set_for(&self, url: &str, value: Result<T, String>) {
        self.per_url.write().await.insert(url.to_string(), value);
    }

    async fn fail_with(&self, message: &str) {
        *self.error.write().await = Some(message.to_string());
    }

    async fn clear_error(&self) {
        *self.error.write().await = None;
    }

    async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

/// Mock reachability checker. Answers `200` by default.
pub struct MockReachability {
    script: Scripted<ReachabilityReport>,
}

impl Default for MockReachability {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReachability {
    pub fn new() -> Self {
        Self {
            script: Scripted::new(ReachabilityReport {
                http_code: Some(200),
                http_chain: Some("200".to_string()),
                is_valid: true,
            }),
        }
    }

    pub async fn set_report(&self, report: ReachabilityReport) {
        self.script.set_default(report).await;
    }

    /// Report for one URL only.
    pub async fn set_report_for(&self, url: &str, report: ReachabilityReport) {
        self.script.set_for(url, Ok(report)).await;
    }

    pub async fn fail_for(&self, url: &str, message: &str) {
        self.script.set_for(url, Err(message.to_string())).await;
    }

    pub async fn fail_with(&self, message: &str) {
        self.script.fail_with(message).await;
    }

    pub async fn clear_error(&self) {
        self.script.clear_error().await;
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.script.set_delay(delay).await;
    }

    /// URLs checked so far.
    pub async fn checked_urls(&self) -> Vec<String> {
        self.script.calls().await
    }
}

#[async_trait]
impl ReachabilityChecker for MockReachability {
    fn name(&self) -> &str {
        "mock"
    }

    async fn check(&self, url: &str) -> Result<ReachabilityReport, CapabilityError> {
        self.script.respond(url).await
    }
}

/// Mock screenshot and social discovery.
pub struct MockDiscovery {
    script: Scripted<VisualDiscovery>,
}

impl Default for MockDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDiscovery {
    pub fn new() -> Self {
        let mut social_links = BTreeMap::new();
        social_links.insert("twitter".to_string(), "https://twitter.com/example".to_string());
        social_links.insert("github".to_string(), "https://github.com/example".to_string());

        Self {
            script: Scripted::new(VisualDiscovery {
                asset_url: Some("https://cdn.example.com/shots/default.png".to_string()),
                social_links,
                has_affiliate_program: Some(false),
                affiliate_url: None,
            }),
        }
    }

    pub async fn set_result(&self, result: VisualDiscovery) {
        self.script.set_default(result).await;
    }

    pub async fn set_result_for(&self, url: &str, result: VisualDiscovery) {
        self.script.set_for(url, Ok(result)).await;
    }

    pub async fn fail_with(&self, message: &str) {
        self.script.fail_with(message).await;
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.script.set_delay(delay).await;
    }

    pub async fn call_count(&self) -> usize {
        self.script.calls().await.len()
    }
}

#[async_trait]
impl VisualDiscoverer for MockDiscovery {
    fn name(&self) -> &str {
        "mock"
    }

    async fn discover(&self, url: &str) -> Result<VisualDiscovery, CapabilityError> {
        self.script.respond(url).await
    }
}

/// Mock content extractor. Remembers the social links it was last given.
pub struct MockContent {
    script: Scripted<ContentExtraction>,
    last_social_links: RwLock<BTreeMap<String, String>>,
}

impl Default for MockContent {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContent {
    pub fn new() -> Self {
        Self {
            script: Scripted::new(ContentExtraction {
                description: Some("A tool that does useful things.".to_string()),
                pages_processed: 3,
            }),
            last_social_links: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn set_result(&self, result: ContentExtraction) {
        self.script.set_default(result).await;
    }

    pub async fn fail_with(&self, message: &str) {
        self.script.fail_with(message).await;
    }

    pub async fn last_social_links(&self) -> BTreeMap<String, String> {
        self.last_social_links.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.script.calls().await.len()
    }
}

#[async_trait]
impl ContentExtractor for MockContent {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(
        &self,
        url: &str,
        social_links: &BTreeMap<String, String>,
    ) -> Result<ContentExtraction, CapabilityError> {
        *self.last_social_links.write().await = social_links.clone();
        self.script.respond(url).await
    }
}

/// Mock pricing extractor. Answers `FREEMIUM` by default.
pub struct MockPricing {
    script: Scripted<PricingInfo>,
}

impl Default for MockPricing {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPricing {
    pub fn new() -> Self {
        Self {
            script: Scripted::new(PricingInfo {
                pricing_type: PricingType::Freemium,
                pricing_details: Some("Free tier, Pro from $9/month".to_string()),
            }),
        }
    }

    pub async fn set_result(&self, result: PricingInfo) {
        self.script.set_default(result).await;
    }

    pub async fn fail_with(&self, message: &str) {
        self.script.fail_with(message).await;
    }

    pub async fn call_count(&self) -> usize {
        self.script.calls().await.len()
    }
}

#[async_trait]
impl PricingExtractor for MockPricing {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract_pricing(&self, url: &str) -> Result<PricingInfo, CapabilityError> {
        self.script.respond(url).await
    }
}

/// Mock narrative generator. Remembers the description it was last given.
pub struct MockNarrative {
    script: Scripted<Narrative>,
    last_description: RwLock<Option<String>>,
}

impl Default for MockNarrative {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNarrative {
    pub fn new() -> Self {
        Self {
            script: Scripted::new(Narrative {
                detailed_description: Some(
                    "A longer walkthrough of what the tool does and who it is for.".to_string(),
                ),
            }),
            last_description: RwLock::new(None),
        }
    }

    pub async fn set_result(&self, result: Narrative) {
        self.script.set_default(result).await;
    }

    pub async fn fail_with(&self, message: &str) {
        self.script.fail_with(message).await;
    }

    pub async fn last_description(&self) -> Option<String> {
        self.last_description.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.script.calls().await.len()
    }
}

#[async_trait]
impl NarrativeGenerator for MockNarrative {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        url: &str,
        description: Option<&str>,
    ) -> Result<Narrative, CapabilityError> {
        *self.last_description.write().await = description.map(String::from);
        self.script.respond(url).await
    }
}

/// All mocks wired together, with handles kept for configuration and
/// assertions.
///
/// ```rust,ignore
/// let mocks = MockCapabilities::new();
/// mocks.pricing.fail_with("rate limited").await;
/// let runner = PipelineRunner::new(mocks.build());
/// ```
#[derive(Clone)]
pub struct MockCapabilities {
    pub reachability: Arc<MockReachability>,
    pub discovery: Arc<MockDiscovery>,
    pub content: Arc<MockContent>,
    pub pricing: Arc<MockPricing>,
    pub narrative: Arc<MockNarrative>,
    pub store: Arc<MockItemStore>,
}

impl Default for MockCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCapabilities {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MockItemStore::new()))
    }

    pub fn with_store(store: Arc<MockItemStore>) -> Self {
        Self {
            reachability: Arc::new(MockReachability::new()),
            discovery: Arc::new(MockDiscovery::new()),
            content: Arc::new(MockContent::new()),
            pricing: Arc::new(MockPricing::new()),
            narrative: Arc::new(MockNarrative::new()),
            store,
        }
    }

    /// Capability set backed by these mocks.
    pub fn build(&self) -> Capabilities {
        Capabilities {
            reachability: self.reachability.clone(),
            discovery: self.discovery.clone(),
            content: self.content.clone(),
            pricing: self.pricing.clone(),
            narrative: self.narrative.clone(),
            persister: self.store.clone(),
            names: self.store.clone(),
        }
    }
}
