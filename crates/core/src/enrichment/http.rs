//! HTTP-backed capability implementations.

use async_trait::async_trait;
use reqwest::{redirect, Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::CapabilitiesConfig;

use super::error::CapabilityError;
use super::traits::{
    ContentExtractor, NarrativeGenerator, PricingExtractor, ReachabilityChecker, VisualDiscoverer,
};
use super::types::{
    ContentExtraction, Narrative, PricingInfo, ReachabilityReport, VisualDiscovery,
};

/// Chain marker recorded when the host name could not be resolved.
pub const DNS_CHAIN: &str = "DNS";

/// Probes URLs with plain GET requests, following redirects by hand so the
/// full status chain can be recorded.
pub struct HttpReachabilityChecker {
    client: Client,
    max_redirects: usize,
}

impl HttpReachabilityChecker {
    pub fn new(config: &CapabilitiesConfig) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.reachability_timeout_secs))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| CapabilityError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }
}

#[async_trait]
impl ReachabilityChecker for HttpReachabilityChecker {
    fn name(&self) -> &str {
        "http"
    }

    async fn check(&self, url: &str) -> Result<ReachabilityReport, CapabilityError> {
        let mut current = Url::parse(url)
            .map_err(|e| CapabilityError::Request(format!("invalid URL {}: {}", url, e)))?;
        let mut codes: Vec<u16> = Vec::new();

        for _ in 0..=self.max_redirects {
            let response = match self.client.get(current.clone()).send().await {
                Ok(response) => response,
                Err(e) if is_dns_error(&e) => {
                    debug!(url = url, "DNS resolution failed");
                    return Ok(ReachabilityReport {
                        http_code: None,
                        http_chain: Some(DNS_CHAIN.to_string()),
                        is_valid: false,
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    debug!(url = url, error = %e, "Target unreachable");
                    return Ok(ReachabilityReport {
                        http_code: None,
                        http_chain: None,
                        is_valid: false,
                    });
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            codes.push(status.as_u16());

            if !status.is_redirection() {
                break;
            }

            let next = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| current.join(location).ok());

            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        let http_code = codes.last().copied();
        Ok(ReachabilityReport {
            http_code,
            http_chain: render_chain(&codes),
            is_valid: http_code.is_some_and(|c| (200..400).contains(&c)),
        })
    }
}

/// Renders observed status codes as `"301 -> 302 -> 200"`.
fn render_chain(codes: &[u16]) -> Option<String> {
    if codes.is_empty() {
        return None;
    }
    Some(
        codes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" -> "),
    )
}

/// reqwest does not classify resolver failures, so look for the resolver's
/// message anywhere in the error's source chain.
fn is_dns_error(e: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(e);
    while let Some(err) = source {
        if is_dns_message(&err.to_string()) {
            return true;
        }
        source = err.source();
    }
    false
}

fn is_dns_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("dns error")
        || message.contains("failed to lookup address")
        || message.contains("name or service not known")
        || message.contains("no such host")
}

/// Client for the enrichment service that hosts screenshot capture, crawling,
/// pricing detection and narrative generation.
///
/// Each capability is a `POST {endpoint}/{operation}` with a JSON body.
pub struct RemoteCapabilityClient {
    client: Client,
    endpoint: String,
}

impl RemoteCapabilityClient {
    pub fn new(config: &CapabilitiesConfig) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CapabilityError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, R>(&self, operation: &str, body: &B) -> Result<R, CapabilityError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, operation);
        debug!(url = %url, "Calling enrichment service");

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Service {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))
    }
}

#[derive(Serialize)]
struct UrlRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
    social_links: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct NarrativeRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[async_trait]
impl VisualDiscoverer for RemoteCapabilityClient {
    fn name(&self) -> &str {
        "remote"
    }

    async fn discover(&self, url: &str) -> Result<VisualDiscovery, CapabilityError> {
        self.post("discover", &UrlRequest { url }).await
    }
}

#[async_trait]
impl ContentExtractor for RemoteCapabilityClient {
    fn name(&self) -> &str {
        "remote"
    }

    async fn extract(
        &self,
        url: &str,
        social_links: &BTreeMap<String, String>,
    ) -> Result<ContentExtraction, CapabilityError> {
        self.post("extract", &ExtractRequest { url, social_links }).await
    }
}

#[async_trait]
impl PricingExtractor for RemoteCapabilityClient {
    fn name(&self) -> &str {
        "remote"
    }

    async fn extract_pricing(&self, url: &str) -> Result<PricingInfo, CapabilityError> {
        self.post("pricing", &UrlRequest { url }).await
    }
}

#[async_trait]
impl NarrativeGenerator for RemoteCapabilityClient {
    fn name(&self) -> &str {
        "remote"
    }

    async fn generate(
        &self,
        url: &str,
        description: Option<&str>,
    ) -> Result<Narrative, CapabilityError> {
        self.post("narrative", &NarrativeRequest { url, description }).await
    }
}
