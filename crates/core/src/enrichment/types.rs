//! Payloads exchanged with the external capabilities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of probing a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityReport {
    /// Final HTTP status code, if a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    /// Textual redirect chain such as `"301 -> 200"`, or `"DNS"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_chain: Option<String>,
    /// Whether the target answered with a usable (2xx/3xx) response.
    pub is_valid: bool,
}

/// Screenshot and social profile discovery for a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualDiscovery {
    /// URL of the captured screenshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
    /// Platform name to profile URL.
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_affiliate_program: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_url: Option<String>,
}

impl VisualDiscovery {
    /// True if neither a screenshot nor any social link was found.
    pub fn is_empty(&self) -> bool {
        self.asset_url.as_deref().map_or(true, |u| u.trim().is_empty())
            && self.social_links.is_empty()
    }
}

/// Text content extracted from a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentExtraction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub pages_processed: u32,
}

/// Pricing model of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingType {
    Free,
    Freemium,
    Paid,
    Subscription,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingType::Free => "FREE",
            PricingType::Freemium => "FREEMIUM",
            PricingType::Paid => "PAID",
            PricingType::Subscription => "SUBSCRIPTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FREE" => Some(PricingType::Free),
            "FREEMIUM" => Some(PricingType::Freemium),
            "PAID" => Some(PricingType::Paid),
            "SUBSCRIPTION" => Some(PricingType::Subscription),
            _ => None,
        }
    }
}

impl std::fmt::Display for PricingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected pricing information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInfo {
    pub pricing_type: PricingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_details: Option<String>,
}

/// Generated long-form description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_type_wire_format() {
        let info: PricingInfo =
            serde_json::from_str(r#"{"pricing_type":"FREEMIUM","pricing_details":"Pro $9/mo"}"#)
                .unwrap();
        assert_eq!(info.pricing_type, PricingType::Freemium);
        assert_eq!(info.pricing_details.as_deref(), Some("Pro $9/mo"));

        assert_eq!(PricingType::parse("subscription"), Some(PricingType::Subscription));
        assert_eq!(PricingType::parse("lifetime"), None);
    }

    #[test]
    fn test_visual_discovery_is_empty() {
        assert!(VisualDiscovery::default().is_empty());

        let blank_asset = VisualDiscovery {
            asset_url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank_asset.is_empty());

        let mut with_links = VisualDiscovery::default();
        with_links
            .social_links
            .insert("github".to_string(), "https://github.com/acme".to_string());
        assert!(!with_links.is_empty());
    }

    #[test]
    fn test_reachability_report_omits_missing_fields() {
        let report = ReachabilityReport {
            http_code: None,
            http_chain: Some("DNS".to_string()),
            is_valid: false,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("http_code").is_none());
        assert_eq!(json["http_chain"], "DNS");
    }
}
