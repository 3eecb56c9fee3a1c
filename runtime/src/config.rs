// Copyright 2026 Deepcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run configuration.
//!
//! A single [`CrawlConfig`] is built once at startup and shared by reference
//! with every component. Each field resolves as: explicit flag, then a
//! `DEEPCRAWL_*` environment variable, then the built-in default.

use crate::error::{CrawlError, CrawlResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Markdown directory of forum sites the crawl starts from.
pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/fastfire/deepdarkCTI/main/forum.md";

/// Tor check API, returns `{"IsTor": bool, "IP": "..."}`.
pub const DEFAULT_IDENTITY_URL: &str = "https://check.torproject.org/api/ip";

/// Local Tor daemon SOCKS port.
pub const DEFAULT_PROXY: &str = "127.0.0.1:9050";

pub const DEFAULT_OUTPUT_DIR: &str = "scraped_sites";
pub const COLD_DIR_NAME: &str = "old_runs";
pub const DEFAULT_KEYWORDS_PATH: &str = "keywords.txt";

/// What to do when the proxy identity check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Stop before rotating or fetching anything.
    #[default]
    Abort,
    /// Log a warning and crawl with unverified anonymity.
    Continue,
}

impl std::str::FromStr for IdentityPolicy {
    type Err = CrawlError;

    fn from_str(s: &str) -> CrawlResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(IdentityPolicy::Abort),
            "continue" | "warn" => Ok(IdentityPolicy::Continue),
            other => Err(CrawlError::Config(format!(
                "unknown identity policy '{other}' (expected 'abort' or 'continue')"
            ))),
        }
    }
}

/// Everything a run needs to know, passed explicitly into each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Accepted for compatibility; only the seed sites are crawled.
    pub depth: u32,
    /// Fixed settle time after navigation, in seconds.
    pub pause_secs: u64,
    pub verbose: bool,
    /// Directory holding the current run's artifacts.
    pub output_dir: PathBuf,
    /// Directory receiving rotated artifacts of earlier runs.
    pub cold_dir: PathBuf,
    /// SOCKS endpoint of the anonymizing proxy, `host:port`.
    pub proxy: String,
    pub source_url: String,
    pub keywords_path: PathBuf,
    pub identity_url: String,
    pub identity_policy: IdentityPolicy,
    /// Also write a `{url, title, text}` JSON file next to each HTML artifact.
    pub json_sidecar: bool,
    pub proxy_only_timeout_secs: u64,
    pub standard_timeout_secs: u64,
    pub listen: SocketAddr,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        Self {
            depth: 1,
            pause_secs: 5,
            verbose: false,
            cold_dir: output_dir.join(COLD_DIR_NAME),
            output_dir,
            proxy: DEFAULT_PROXY.to_string(),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            keywords_path: PathBuf::from(DEFAULT_KEYWORDS_PATH),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            identity_policy: IdentityPolicy::Abort,
            json_sidecar: false,
            proxy_only_timeout_secs: 30,
            standard_timeout_secs: 10,
            listen: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub depth: Option<u32>,
    pub pause_secs: Option<u64>,
    pub verbose: bool,
    pub output_dir: Option<PathBuf>,
    pub proxy: Option<String>,
    pub source_url: Option<String>,
    pub keywords_path: Option<PathBuf>,
    pub identity_policy: Option<IdentityPolicy>,
    pub json_sidecar: bool,
    pub listen: Option<SocketAddr>,
    pub identity_url: Option<String>,
    pub proxy_only_timeout_secs: Option<u64>,
    pub standard_timeout_secs: Option<u64>,
}

impl CrawlConfig {
    /// Resolve the configuration from flags, then environment, then defaults.
    pub fn resolve(overrides: ConfigOverrides) -> CrawlResult<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Same as [`CrawlConfig::resolve`] with an injectable environment lookup.
    pub fn resolve_with<F>(overrides: ConfigOverrides, env: F) -> CrawlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let depth = match overrides.depth {
            Some(d) => d,
            None => parse_env(&env, "DEEPCRAWL_DEPTH")?.unwrap_or(defaults.depth),
        };
        let pause_secs = match overrides.pause_secs {
            Some(p) => p,
            None => parse_env(&env, "DEEPCRAWL_PAUSE")?.unwrap_or(defaults.pause_secs),
        };
        let output_dir = overrides
            .output_dir
            .or_else(|| env("DEEPCRAWL_OUTPUT_DIR").map(PathBuf::from))
            .unwrap_or(defaults.output_dir);
        let proxy = overrides
            .proxy
            .or_else(|| env("DEEPCRAWL_PROXY"))
            .unwrap_or(defaults.proxy);
        let source_url = overrides
            .source_url
            .or_else(|| env("DEEPCRAWL_SOURCE_URL"))
            .unwrap_or(defaults.source_url);
        let keywords_path = overrides
            .keywords_path
            .or_else(|| env("DEEPCRAWL_KEYWORDS").map(PathBuf::from))
            .unwrap_or(defaults.keywords_path);
        let identity_url = overrides
            .identity_url
            .or_else(|| env("DEEPCRAWL_IDENTITY_URL"))
            .unwrap_or(defaults.identity_url);
        let identity_policy = match overrides.identity_policy {
            Some(p) => p,
            None => parse_env(&env, "DEEPCRAWL_IDENTITY_POLICY")?
                .unwrap_or(defaults.identity_policy),
        };
        let json_sidecar = overrides.json_sidecar || env_flag(&env, "DEEPCRAWL_JSON_SIDECAR");
        let verbose = overrides.verbose || env_flag(&env, "DEEPCRAWL_VERBOSE");
        let proxy_only_timeout_secs = match overrides.proxy_only_timeout_secs {
            Some(t) => t,
            None => parse_env(&env, "DEEPCRAWL_PROXY_ONLY_TIMEOUT")?
                .unwrap_or(defaults.proxy_only_timeout_secs),
        };
        let standard_timeout_secs = match overrides.standard_timeout_secs {
            Some(t) => t,
            None => parse_env(&env, "DEEPCRAWL_TIMEOUT")?.unwrap_or(defaults.standard_timeout_secs),
        };
        let listen = match overrides.listen {
            Some(addr) => addr,
            None => parse_env(&env, "DEEPCRAWL_LISTEN")?.unwrap_or(defaults.listen),
        };

        let config = Self {
            depth,
            pause_secs,
            verbose,
            cold_dir: output_dir.join(COLD_DIR_NAME),
            output_dir,
            proxy,
            source_url,
            keywords_path,
            identity_url,
            identity_policy,
            json_sidecar,
            proxy_only_timeout_secs,
            standard_timeout_secs,
            listen,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, mid-run.
    pub fn validate(&self) -> CrawlResult<()> {
        let (host, port) = self
            .proxy
            .rsplit_once(':')
            .ok_or_else(|| CrawlError::Config(format!("proxy '{}' is not host:port", self.proxy)))?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(CrawlError::Config(format!(
                "proxy '{}' is not host:port",
                self.proxy
            )));
        }
        if self.proxy_only_timeout_secs == 0 || self.standard_timeout_secs == 0 {
            return Err(CrawlError::Config("fetch timeouts must be non-zero".into()));
        }
        url::Url::parse(&self.source_url)
            .map_err(|e| CrawlError::Config(format!("source url '{}': {e}", self.source_url)))?;
        Ok(())
    }

    /// Proxy URL for HTTP clients; `socks5h` resolves names on the proxy side.
    pub fn socks_url(&self) -> String {
        format!("socks5h://{}", self.proxy)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

fn parse_env<T, F>(env: &F, key: &str) -> CrawlResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CrawlError::Config(format!("{key}={raw}: {e}"))),
    }
}

fn env_flag<F>(env: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = CrawlConfig::resolve_with(ConfigOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.pause_secs, 5);
        assert_eq!(cfg.proxy, "127.0.0.1:9050");
        assert_eq!(cfg.cold_dir, PathBuf::from("scraped_sites/old_runs"));
        assert_eq!(cfg.identity_policy, IdentityPolicy::Abort);
        assert_eq!(cfg.proxy_only_timeout_secs, 30);
        assert_eq!(cfg.standard_timeout_secs, 10);
    }

    #[test]
    fn test_flag_beats_env_beats_default() {
        let env = env_of(&[("DEEPCRAWL_PAUSE", "9"), ("DEEPCRAWL_DEPTH", "3")]);
        let overrides = ConfigOverrides {
            pause_secs: Some(2),
            ..Default::default()
        };
        let cfg = CrawlConfig::resolve_with(overrides, env).unwrap();
        assert_eq!(cfg.pause_secs, 2);
        assert_eq!(cfg.depth, 3);
    }

    #[test]
    fn test_timeouts_and_identity_url_are_tunable() {
        let env = env_of(&[
            ("DEEPCRAWL_PROXY_ONLY_TIMEOUT", "60"),
            ("DEEPCRAWL_TIMEOUT", "20"),
            ("DEEPCRAWL_IDENTITY_URL", "https://env.example/ip"),
        ]);
        let overrides = ConfigOverrides {
            standard_timeout_secs: Some(5),
            identity_url: Some("https://flag.example/ip".into()),
            ..Default::default()
        };
        let cfg = CrawlConfig::resolve_with(overrides, env).unwrap();
        assert_eq!(cfg.proxy_only_timeout_secs, 60);
        assert_eq!(cfg.standard_timeout_secs, 5);
        assert_eq!(cfg.identity_url, "https://flag.example/ip");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let overrides = ConfigOverrides {
            proxy_only_timeout_secs: Some(0),
            ..Default::default()
        };
        let err = CrawlConfig::resolve_with(overrides, env_of(&[])).unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
        assert_eq!(err.exit_code(), 64);

        let err = CrawlConfig::resolve_with(
            ConfigOverrides::default(),
            env_of(&[("DEEPCRAWL_TIMEOUT", "0")]),
        )
        .unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }

    #[test]
    fn test_output_dir_moves_cold_dir() {
        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from("/srv/run")),
            ..Default::default()
        };
        let cfg = CrawlConfig::resolve_with(overrides, env_of(&[])).unwrap();
        assert_eq!(cfg.cold_dir, PathBuf::from("/srv/run/old_runs"));
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let env = env_of(&[("DEEPCRAWL_PAUSE", "soon")]);
        let err = CrawlConfig::resolve_with(ConfigOverrides::default(), env).unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }

    #[test]
    fn test_proxy_must_be_host_port() {
        let overrides = ConfigOverrides {
            proxy: Some("localhost".into()),
            ..Default::default()
        };
        assert!(CrawlConfig::resolve_with(overrides, env_of(&[])).is_err());
    }

    #[test]
    fn test_identity_policy_parse() {
        assert_eq!("abort".parse::<IdentityPolicy>().unwrap(), IdentityPolicy::Abort);
        assert_eq!(
            "Continue".parse::<IdentityPolicy>().unwrap(),
            IdentityPolicy::Continue
        );
        assert!("maybe".parse::<IdentityPolicy>().is_err());
    }

    #[test]
    fn test_socks_url_uses_remote_dns() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.socks_url(), "socks5h://127.0.0.1:9050");
    }
}
