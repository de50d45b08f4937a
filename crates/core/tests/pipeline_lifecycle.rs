//! Pipeline lifecycle integration tests.
//!
//! These tests run the full five-stage pipeline against mock capabilities:
//! - Stage 1 gating and cancellation
//! - Partial success threshold
//! - Data flow between stages
//! - Persistence failures downgrading results to warnings

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use curator_core::{
    classify,
    enrichment::{ContentExtraction, ItemPersister, PersistError, VisualDiscovery},
    item::{ItemStore, ItemUpdate},
    pipeline::{PipelineRunner, StageKind, StageStatus, CANCELLED_MESSAGE},
    testing::{fixtures, MockCapabilities, MockItemStore},
    ReachabilityBucket,
};

/// Persister that refuses any update carrying a description.
struct RejectDescriptions {
    inner: Arc<MockItemStore>,
}

#[async_trait]
impl ItemPersister for RejectDescriptions {
    async fn persist(&self, item_id: &str, update: &ItemUpdate) -> Result<(), PersistError> {
        if update.description.is_some() {
            return Err(PersistError::Storage("disk full".to_string()));
        }
        self.inner.persist(item_id, update).await
    }
}

/// Test helper wiring a runner to a set of mocks.
struct TestHarness {
    runner: PipelineRunner,
    mocks: MockCapabilities,
}

impl TestHarness {
    fn new() -> Self {
        let store = Arc::new(MockItemStore::with_tools([
            fixtures::tool_entry("acme", "Acme"),
            fixtures::tool_entry("dead", "Dead Site"),
        ]));
        let mocks = MockCapabilities::with_store(store);
        let runner = PipelineRunner::new(mocks.build()).with_retry(fixtures::fast_retry());
        Self { runner, mocks }
    }
}

#[tokio::test]
async fn test_full_run_persists_every_stage() {
    let harness = TestHarness::new();
    let item = fixtures::item("acme");

    let report = harness.runner.run(&item).await;

    assert!(report.run.overall_success);
    assert_eq!(report.run.stages.len(), 5);
    assert_eq!(report.run.success_count(), 5);

    let record = harness.mocks.store.get("acme").unwrap().unwrap();
    assert_eq!(record.http_code, Some(200));
    assert!(record.asset_url.is_some());
    assert!(record.description.is_some());
    assert!(record.pricing_type.is_some());
    assert!(record.detailed_description.is_some());
}

#[tokio::test]
async fn test_dns_failure_cancels_remaining_stages() {
    let harness = TestHarness::new();
    let item = fixtures::item("dead");
    harness
        .mocks
        .reachability
        .set_report_for(&item.url, fixtures::dns_failure())
        .await;

    let report = harness.runner.run(&item).await;

    assert!(!report.run.overall_success);
    let gate = report.run.stage(StageKind::Reachability).unwrap();
    assert_eq!(gate.status, StageStatus::Error);
    for kind in &StageKind::ALL[1..] {
        let result = report.run.stage(*kind).unwrap();
        assert_eq!(result.status, StageStatus::Error);
        assert_eq!(result.message, CANCELLED_MESSAGE);
    }

    // No downstream capability was reached.
    assert_eq!(harness.mocks.discovery.call_count().await, 0);
    assert_eq!(harness.mocks.content.call_count().await, 0);
    assert_eq!(harness.mocks.pricing.call_count().await, 0);
    assert_eq!(harness.mocks.narrative.call_count().await, 0);

    // The observation is kept, so the item now classifies as a DNS error.
    let mut updated = item.clone();
    updated.apply(&report.discovered);
    assert_eq!(classify(&updated).reachability, ReachabilityBucket::DnsError);
}

#[tokio::test]
async fn test_client_error_still_passes_the_gate() {
    let harness = TestHarness::new();
    let item = fixtures::item("acme");
    harness
        .mocks
        .reachability
        .set_report(fixtures::http_status(404))
        .await;

    let report = harness.runner.run(&item).await;

    let gate = report.run.stage(StageKind::Reachability).unwrap();
    assert_eq!(gate.status, StageStatus::Success);
    assert_eq!(report.run.stages.len(), 5);
    assert_eq!(harness.mocks.discovery.call_count().await, 1);
}

#[tokio::test]
async fn test_three_successes_meet_threshold() {
    let harness = TestHarness::new();
    let item = fixtures::item("acme");

    let mut links = BTreeMap::new();
    links.insert("twitter".to_string(), "https://twitter.com/acme".to_string());
    links.insert("github".to_string(), "https://github.com/acme".to_string());
    harness
        .mocks
        .discovery
        .set_result(VisualDiscovery {
            asset_url: Some("https://cdn.example.com/acme.png".to_string()),
            social_links: links.clone(),
            has_affiliate_program: None,
            affiliate_url: None,
        })
        .await;
    harness
        .mocks
        .content
        .set_result(ContentExtraction {
            description: Some("Acme builds anvils.".to_string()),
            pages_processed: 2,
        })
        .await;
    harness.mocks.narrative.fail_with("model overloaded").await;

    let mut capabilities = harness.mocks.build();
    capabilities.persister = Arc::new(RejectDescriptions {
        inner: harness.mocks.store.clone(),
    });
    let runner = PipelineRunner::new(capabilities).with_retry(fixtures::fast_retry());

    let report = runner.run(&item).await;

    let status = |kind| report.run.stage(kind).unwrap().status;
    assert_eq!(status(StageKind::Reachability), StageStatus::Success);
    assert_eq!(status(StageKind::VisualDiscovery), StageStatus::Success);
    assert_eq!(status(StageKind::ContentExtraction), StageStatus::Warning);
    assert_eq!(status(StageKind::PricingExtraction), StageStatus::Success);
    assert_eq!(status(StageKind::NarrativeGeneration), StageStatus::Error);
    assert_eq!(report.run.success_count(), 3);
    assert!(report.run.overall_success);

    // Stage 2 links reach stage 3; a warning stage does not feed stage 5.
    assert_eq!(harness.mocks.content.last_social_links().await, links);
    assert_eq!(harness.mocks.narrative.last_description().await, None);
}

#[tokio::test]
async fn test_failed_stage_does_not_feed_later_stages() {
    let harness = TestHarness::new();
    let item = fixtures::item("acme");
    harness.mocks.discovery.fail_with("renderer offline").await;
    harness.mocks.content.fail_with("crawl blocked").await;

    let report = harness.runner.run(&item).await;

    let discovery = report.run.stage(StageKind::VisualDiscovery).unwrap();
    assert_eq!(discovery.status, StageStatus::Error);
    assert!(discovery.message.contains("renderer offline"));
    assert!(harness.mocks.content.last_social_links().await.is_empty());
    assert_eq!(harness.mocks.narrative.last_description().await, None);
    // Reachability, pricing and narrative still succeed.
    assert_eq!(report.run.success_count(), 3);
    assert!(report.run.overall_success);
}
