//! Outbound traffic through the anonymizing SOCKS relay.
//!
//! Every request leaves through `socks5h://` so name resolution also happens
//! on the relay side. The transport never retries: one call is one attempt.

use crate::config::CrawlConfig;
use crate::error::{CrawlError, CrawlResult};
use crate::sites::Site;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Exit identity reported by the check endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitIdentity {
    pub address: String,
    /// `Some(true)` when the endpoint confirmed the request came through Tor.
    pub is_tor: Option<bool>,
}

/// Per-address-class fetch deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub proxy_only: Duration,
    pub standard: Duration,
}

impl TimeoutPolicy {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            proxy_only: Duration::from_secs(config.proxy_only_timeout_secs),
            standard: Duration::from_secs(config.standard_timeout_secs),
        }
    }

    /// Hidden services get the extended deadline.
    pub fn timeout_for(&self, site: &Site) -> Duration {
        if site.is_proxy_only {
            self.proxy_only
        } else {
            self.standard
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            proxy_only: Duration::from_secs(30),
            standard: Duration::from_secs(10),
        }
    }
}

/// Request transport bound to the anonymizing network.
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Fetch a URL once, bounded by `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> CrawlResult<Vec<u8>>;
    /// Ask the check endpoint which exit address our traffic uses.
    async fn check_identity(&self) -> CrawlResult<ExitIdentity>;
}

/// reqwest client routed through a SOCKS5 proxy.
pub struct SocksTransport {
    client: reqwest::Client,
    identity_url: String,
    identity_timeout: Duration,
}

impl SocksTransport {
    pub fn new(config: &CrawlConfig) -> CrawlResult<Self> {
        let proxy = reqwest::Proxy::all(config.socks_url())
            .map_err(|e| CrawlError::Config(format!("proxy {}: {e}", config.proxy)))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| CrawlError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            identity_url: config.identity_url.clone(),
            identity_timeout: Duration::from_secs(config.proxy_only_timeout_secs),
        })
    }
}

#[async_trait]
impl ProxyTransport for SocksTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> CrawlResult<Vec<u8>> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                CrawlError::FetchTimeout {
                    url: url.to_string(),
                    secs: timeout.as_secs(),
                }
            } else {
                CrawlError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;
        debug!(url, status = resp.status().as_u16(), "proxied response");
        let bytes = resp.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }

    async fn check_identity(&self) -> CrawlResult<ExitIdentity> {
        let body = self
            .fetch(&self.identity_url, self.identity_timeout)
            .await
            .map_err(|e| CrawlError::Identity(e.to_string()))?;
        let identity = parse_identity(&String::from_utf8_lossy(&body))?;
        info!(exit = %identity.address, "connected through proxy");
        Ok(identity)
    }
}

/// Interpret a check endpoint body.
///
/// Accepts the Tor project JSON shape or a bare address in plain text.
pub fn parse_identity(body: &str) -> CrawlResult<ExitIdentity> {
    #[derive(Deserialize)]
    struct TorCheck {
        #[serde(rename = "IsTor")]
        is_tor: Option<bool>,
        #[serde(rename = "IP")]
        ip: Option<String>,
    }

    let trimmed = body.trim();
    if let Ok(check) = serde_json::from_str::<TorCheck>(trimmed) {
        if check.is_tor == Some(false) {
            return Err(CrawlError::Identity(format!(
                "traffic is not leaving through Tor (exit {})",
                check.ip.as_deref().unwrap_or("unknown")
            )));
        }
        return match check.ip {
            Some(ip) if !ip.is_empty() => Ok(ExitIdentity {
                address: ip,
                is_tor: check.is_tor,
            }),
            _ => Err(CrawlError::Identity("check endpoint returned no address".into())),
        };
    }

    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) || trimmed.contains('<') {
        return Err(CrawlError::Identity(
            "check endpoint returned an unrecognised body".into(),
        ));
    }
    Ok(ExitIdentity {
        address: trimmed.to_string(),
        is_tor: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_policy_by_address_class() {
        let policy = TimeoutPolicy::default();
        let onion = Site::parse("http://dreadytofatroptsdj6io7l3xptbet6onoyno2yv7jicoxknyazubrad.onion").unwrap();
        let clear = Site::parse("https://xss.is").unwrap();
        assert_eq!(policy.timeout_for(&onion), Duration::from_secs(30));
        assert_eq!(policy.timeout_for(&clear), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_tor_check_json() {
        let id = parse_identity(r#"{"IsTor":true,"IP":"185.220.101.4"}"#).unwrap();
        assert_eq!(id.address, "185.220.101.4");
        assert_eq!(id.is_tor, Some(true));
    }

    #[test]
    fn test_not_tor_is_identity_failure() {
        let err = parse_identity(r#"{"IsTor":false,"IP":"203.0.113.9"}"#).unwrap_err();
        assert!(matches!(err, CrawlError::Identity(_)));
    }

    #[test]
    fn test_plain_text_address() {
        let id = parse_identity("185.220.101.4\n").unwrap();
        assert_eq!(id.address, "185.220.101.4");
        assert_eq!(id.is_tor, None);
    }

    #[test]
    fn test_html_body_rejected() {
        assert!(parse_identity("<html><body>blocked</body></html>").is_err());
        assert!(parse_identity("").is_err());
    }

    #[test]
    fn test_transport_builds_from_default_config() {
        let transport = SocksTransport::new(&CrawlConfig::default());
        assert!(transport.is_ok());
    }

    fn transport_via(proxy: std::net::SocketAddr) -> SocksTransport {
        SocksTransport::new(&CrawlConfig {
            proxy: proxy.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_silent_proxy_is_fetch_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering the handshake.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let err = transport_via(addr)
            .fetch("http://x.onion/", Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            CrawlError::FetchTimeout { url, secs } => {
                assert_eq!(url, "http://x.onion/");
                assert_eq!(secs, 1);
            }
            other => panic!("expected FetchTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refused_proxy_is_fetch_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = transport_via(addr)
            .fetch("http://x.onion/", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(
            matches!(err, CrawlError::Fetch { ref url, .. } if url == "http://x.onion/"),
            "expected Fetch, got {err:?}"
        );
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_identity_check_failure_is_identity_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let err = transport_via(addr).check_identity().await.unwrap_err();
        assert!(matches!(err, CrawlError::Identity(_)));
    }
}
