//! Stage executors.
//!
//! Each executor calls one capability for one item and folds every outcome,
//! including capability errors, into a [`StageResult`]. Successful findings
//! are written back through the item persister; a failed write downgrades
//! the stage to `warning`.

use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::enrichment::{Capabilities, DNS_CHAIN};
use crate::item::{ItemUpdate, WorkItem};

use super::types::{StageKind, StageResult, StageStatus};

/// Outputs of earlier stages that later stages consume.
///
/// Only `success` stages populate these; anything else leaves the default.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    pub social_links: BTreeMap<String, String>,
    pub description: Option<String>,
}

/// Result of one stage plus whatever it found about the item.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub result: StageResult,
    pub discovered: ItemUpdate,
}

impl StageOutput {
    fn failed(result: StageResult) -> Self {
        Self {
            result,
            discovered: ItemUpdate::default(),
        }
    }
}

/// Runs a single stage.
pub async fn execute_stage(
    capabilities: &Capabilities,
    kind: StageKind,
    item: &WorkItem,
    inputs: &StageInputs,
) -> StageOutput {
    debug!("Stage {} ({}) starting for {}", kind.index(), kind, item.id);

    let output = match kind {
        StageKind::Reachability => reachability(capabilities, item).await,
        StageKind::VisualDiscovery => visual_discovery(capabilities, item).await,
        StageKind::ContentExtraction => {
            content_extraction(capabilities, item, &inputs.social_links).await
        }
        StageKind::PricingExtraction => pricing_extraction(capabilities, item).await,
        StageKind::NarrativeGeneration => {
            narrative_generation(capabilities, item, inputs.description.as_deref()).await
        }
    };

    debug!(
        "Stage {} ({}) for {}: {} - {}",
        kind.index(),
        kind,
        item.id,
        output.result.status,
        output.result.message
    );
    output
}

async fn persist_or_warn(
    capabilities: &Capabilities,
    item_id: &str,
    update: &ItemUpdate,
    message: String,
    data: serde_json::Value,
) -> StageResult {
    match capabilities.persister.persist(item_id, update).await {
        Ok(()) => StageResult::success(message, data),
        Err(e) => {
            warn!("Failed to save results for {}: {}", item_id, e);
            StageResult::warning(format!("{} (not saved: {})", message, e), data)
        }
    }
}

/// A completed check is a success even for 4xx/5xx. DNS failures and checks
/// without any response are errors.
async fn reachability(capabilities: &Capabilities, item: &WorkItem) -> StageOutput {
    let report = match capabilities.reachability.check(&item.url).await {
        Ok(report) => report,
        Err(e) => {
            return StageOutput::failed(StageResult::error(format!(
                "Reachability check failed: {}",
                e
            )))
        }
    };

    let discovered = ItemUpdate {
        reachability_checked: true,
        http_code: report.http_code,
        http_chain: report.http_chain.clone(),
        ..Default::default()
    };
    let data = serde_json::to_value(&report).unwrap_or_default();

    let code = match report.http_code {
        Some(code) if report.http_chain.as_deref() != Some(DNS_CHAIN) => code,
        _ => {
            // Failed observations are still written so the item classifies
            // correctly on the next selection.
            if let Err(e) = capabilities.persister.persist(&item.id, &discovered).await {
                warn!("Failed to save reachability for {}: {}", item.id, e);
            }
            let message = if report.http_chain.as_deref() == Some(DNS_CHAIN) {
                "DNS resolution failed".to_string()
            } else {
                "No response from target".to_string()
            };
            return StageOutput {
                result: StageResult {
                    status: StageStatus::Error,
                    message,
                    data,
                },
                discovered,
            };
        }
    };

    let message = match report.http_chain.as_deref() {
        Some(chain) if chain.contains("->") => format!("HTTP {} via {}", code, chain),
        _ => format!("HTTP {}", code),
    };
    let result = persist_or_warn(capabilities, &item.id, &discovered, message, data).await;
    StageOutput { result, discovered }
}

async fn visual_discovery(capabilities: &Capabilities, item: &WorkItem) -> StageOutput {
    let found = match capabilities.discovery.discover(&item.url).await {
        Ok(found) => found,
        Err(e) => return StageOutput::failed(StageResult::error(format!("Discovery failed: {}", e))),
    };

    let data = serde_json::to_value(&found).unwrap_or_default();
    if found.is_empty() {
        return StageOutput {
            result: StageResult::warning("No screenshot or social links found", data),
            discovered: ItemUpdate::default(),
        };
    }

    let asset_url = found.asset_url.filter(|u| !u.trim().is_empty());
    let link_count = found.social_links.len();
    let message = match asset_url {
        Some(_) => format!("Screenshot captured, {} social links", link_count),
        None => format!("No screenshot, {} social links", link_count),
    };

    let discovered = ItemUpdate {
        asset_url,
        social_links: (link_count > 0).then_some(found.social_links),
        has_affiliate_program: found.has_affiliate_program,
        affiliate_url: found.affiliate_url,
        ..Default::default()
    };

    let result = persist_or_warn(capabilities, &item.id, &discovered, message, data).await;
    StageOutput { result, discovered }
}

async fn content_extraction(
    capabilities: &Capabilities,
    item: &WorkItem,
    social_links: &BTreeMap<String, String>,
) -> StageOutput {
    let extraction = match capabilities.content.extract(&item.url, social_links).await {
        Ok(extraction) => extraction,
        Err(e) => {
            return StageOutput::failed(StageResult::error(format!(
                "Content extraction failed: {}",
                e
            )))
        }
    };

    let description = match extraction.description.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => {
            return StageOutput::failed(StageResult::error(format!(
                "No description extracted ({} pages processed)",
                extraction.pages_processed
            )))
        }
    };

    let discovered = ItemUpdate {
        description: Some(description),
        ..Default::default()
    };
    let message = format!(
        "Extracted description from {} pages",
        extraction.pages_processed
    );
    let data = json!({ "pages_processed": extraction.pages_processed });

    let result = persist_or_warn(capabilities, &item.id, &discovered, message, data).await;
    StageOutput { result, discovered }
}

async fn pricing_extraction(capabilities: &Capabilities, item: &WorkItem) -> StageOutput {
    let pricing = match capabilities.pricing.extract_pricing(&item.url).await {
        Ok(pricing) => pricing,
        Err(e) => {
            return StageOutput::failed(StageResult::error(format!(
                "Pricing extraction failed: {}",
                e
            )))
        }
    };

    let data = serde_json::to_value(&pricing).unwrap_or_default();
    let message = format!("Pricing: {}", pricing.pricing_type);
    let discovered = ItemUpdate {
        pricing_type: Some(pricing.pricing_type),
        pricing_details: pricing.pricing_details,
        ..Default::default()
    };

    let result = persist_or_warn(capabilities, &item.id, &discovered, message, data).await;
    StageOutput { result, discovered }
}

async fn narrative_generation(
    capabilities: &Capabilities,
    item: &WorkItem,
    description: Option<&str>,
) -> StageOutput {
    let narrative = match capabilities.narrative.generate(&item.url, description).await {
        Ok(narrative) => narrative,
        Err(e) => {
            return StageOutput::failed(StageResult::error(format!(
                "Narrative generation failed: {}",
                e
            )))
        }
    };

    let text = match narrative.detailed_description.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            return StageOutput::failed(StageResult::error(
                "No detailed description generated",
            ))
        }
    };

    let message = format!("Generated {} characters", text.chars().count());
    let data = json!({ "length": text.chars().count() });
    let discovered = ItemUpdate {
        detailed_description: Some(text),
        ..Default::default()
    };

    let result = persist_or_warn(capabilities, &item.id, &discovered, message, data).await;
    StageOutput { result, discovered }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{ReachabilityReport, VisualDiscovery};
    use crate::testing::{fixtures, MockCapabilities};

    #[tokio::test]
    async fn test_reachability_404_is_success() {
        let mocks = MockCapabilities::new();
        mocks.reachability.set_report(ReachabilityReport {
            http_code: Some(404),
            http_chain: Some("404".into()),
            is_valid: false,
        })
        .await;

        let item = fixtures::item("t1");
        let out = execute_stage(&mocks.build(), StageKind::Reachability, &item, &Default::default()).await;

        assert_eq!(out.result.status, StageStatus::Success);
        assert_eq!(out.discovered.http_code, Some(404));
        assert_eq!(mocks.store.get_update("t1").unwrap().http_code, Some(404));
    }

    #[tokio::test]
    async fn test_reachability_dns_is_error_but_recorded() {
        let mocks = MockCapabilities::new();
        mocks.reachability.set_report(ReachabilityReport {
            http_code: None,
            http_chain: Some("DNS".into()),
            is_valid: false,
        })
        .await;

        let item = fixtures::item("t1");
        let out = execute_stage(&mocks.build(), StageKind::Reachability, &item, &Default::default()).await;

        assert_eq!(out.result.status, StageStatus::Error);
        assert_eq!(out.result.message, "DNS resolution failed");
        assert_eq!(
            mocks.store.get_update("t1").unwrap().http_chain.as_deref(),
            Some("DNS")
        );
    }

    #[tokio::test]
    async fn test_reachability_without_code_is_error() {
        let mocks = MockCapabilities::new();
        mocks.reachability.set_report(ReachabilityReport::default()).await;

        let item = fixtures::item("t1");
        let out = execute_stage(&mocks.build(), StageKind::Reachability, &item, &Default::default()).await;
        assert_eq!(out.result.status, StageStatus::Error);
    }

    #[tokio::test]
    async fn test_persist_failure_downgrades_to_warning() {
        let mocks = MockCapabilities::new();
        mocks.store.fail_persist(true);

        let item = fixtures::item("t1");
        let out = execute_stage(&mocks.build(), StageKind::PricingExtraction, &item, &Default::default()).await;

        assert_eq!(out.result.status, StageStatus::Warning);
        assert!(out.result.message.contains("not saved"));
        assert!(out.discovered.pricing_type.is_some());
    }

    #[tokio::test]
    async fn test_empty_discovery_is_warning() {
        let mocks = MockCapabilities::new();
        mocks.discovery.set_result(VisualDiscovery::default()).await;

        let item = fixtures::item("t1");
        let out = execute_stage(&mocks.build(), StageKind::VisualDiscovery, &item, &Default::default()).await;

        assert_eq!(out.result.status, StageStatus::Warning);
        assert!(mocks.store.get_update("t1").is_none());
    }

    #[tokio::test]
    async fn test_capability_error_keeps_message() {
        let mocks = MockCapabilities::new();
        mocks.content.fail_with("crawler exploded").await;

        let item = fixtures::item("t1");
        let out = execute_stage(&mocks.build(), StageKind::ContentExtraction, &item, &Default::default()).await;

        assert_eq!(out.result.status, StageStatus::Error);
        assert!(out.result.message.contains("crawler exploded"));
    }

    #[tokio::test]
    async fn test_inputs_flow_to_capabilities() {
        let mocks = MockCapabilities::new();
        let item = fixtures::item("t1");
        let mut inputs = StageInputs::default();
        inputs
            .social_links
            .insert("github".into(), "https://github.com/t1".into());
        inputs.description = Some("A tool".into());

        let caps = mocks.build();
        execute_stage(&caps, StageKind::ContentExtraction, &item, &inputs).await;
        execute_stage(&caps, StageKind::NarrativeGeneration, &item, &inputs).await;

        assert_eq!(mocks.content.last_social_links().await.len(), 1);
        assert_eq!(mocks.narrative.last_description().await.as_deref(), Some("A tool"));
    }
}
