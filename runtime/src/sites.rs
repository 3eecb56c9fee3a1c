//! Candidate site discovery.
//!
//! The crawl starts from one remote markdown document listing forum
//! addresses. Every parenthesised `http(s)` link in it becomes a [`Site`],
//! in document order, duplicates included.

use crate::error::{CrawlError, CrawlResult};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// Host suffix of addresses only reachable through Tor.
pub const PROXY_ONLY_SUFFIX: &str = ".onion";

/// A crawl target derived from a parsed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub url: String,
    /// Host plus explicit port, if any.
    pub netloc: String,
    pub is_proxy_only: bool,
}

impl Site {
    /// Parse a URL into a site. Returns `None` for URLs without a host.
    pub fn parse(raw: &str) -> Option<Self> {
        let parsed = url::Url::parse(raw).ok()?;
        let host = parsed.host_str()?.to_string();
        let netloc = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };
        Some(Site {
            url: raw.to_string(),
            is_proxy_only: host.to_ascii_lowercase().ends_with(PROXY_ONLY_SUFFIX),
            netloc,
        })
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// Anything that can produce the list of sites for a run.
#[async_trait]
pub trait SiteSource: Send + Sync {
    async fn list_sites(&self) -> CrawlResult<Vec<Site>>;
}

fn link_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `[label](url)` or a bare `(url)`; one match per link either way.
    RE.get_or_init(|| {
        Regex::new(r"(?:\[[^\]]*\])?\((https?://[^\s)]+)\)").expect("link regex is valid")
    })
}

/// Extract every embedded link from a markdown document, in order.
pub fn parse_site_list(markdown: &str) -> Vec<Site> {
    link_pattern()
        .captures_iter(markdown)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| Site::parse(m.as_str()))
        .collect()
}

/// Fetches the remote site directory over plain HTTPS.
pub struct SiteListProvider {
    client: reqwest::Client,
    source_url: String,
}

impl SiteListProvider {
    pub fn new(source_url: impl Into<String>, timeout: Duration) -> CrawlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlError::Config(format!("site list client: {e}")))?;
        Ok(Self {
            client,
            source_url: source_url.into(),
        })
    }
}

#[async_trait]
impl SiteSource for SiteListProvider {
    async fn list_sites(&self) -> CrawlResult<Vec<Site>> {
        let network = |e: reqwest::Error| {
            CrawlError::Network(format!("site list {}: {e}", self.source_url))
        };

        let resp = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(network)?
            .error_for_status()
            .map_err(network)?;
        let body = resp.text().await.map_err(network)?;

        let sites = parse_site_list(&body);
        info!(count = sites.len(), source = %self.source_url, "site list retrieved");
        debug!(
            proxy_only = sites.iter().filter(|s| s.is_proxy_only).count(),
            "site list classified"
        );
        Ok(sites)
    }
}
