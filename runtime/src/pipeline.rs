// Copyright 2026 Deepcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! The crawl pipeline: identity → rotate → list → (render → match → archive)*.
//!
//! Sites are processed strictly one at a time. A failed or timed-out fetch
//! skips that site only; a filesystem failure stops the run because the
//! artifact server relies on a consistent layout.

use crate::archive::ArchiveWriter;
use crate::artifact::{ArchivedArtifact, RunLayout};
use crate::config::{CrawlConfig, IdentityPolicy};
use crate::error::CrawlResult;
use crate::fetcher::{FetchStatus, PageFetcher};
use crate::matcher::KeywordMatcher;
use crate::proxy::{ExitIdentity, ProxyTransport};
use crate::rotation::RunRotator;
use crate::sites::SiteSource;
use chrono::Local;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub sites: usize,
    pub fetched: usize,
    pub timeouts: usize,
    pub transport_errors: usize,
    pub matched: usize,
    pub artifacts: Vec<ArchivedArtifact>,
    /// `None` when the identity check failed and the run continued anyway.
    pub identity: Option<ExitIdentity>,
    pub rotated: usize,
    pub elapsed: Duration,
}

/// Check the exit identity and apply `policy` to a failure.
///
/// `Ok(None)` means the check failed and the policy allows crawling anyway.
pub async fn verify_identity(
    transport: &dyn ProxyTransport,
    policy: IdentityPolicy,
) -> CrawlResult<Option<ExitIdentity>> {
    match transport.check_identity().await {
        Ok(identity) => Ok(Some(identity)),
        Err(e) => match policy {
            IdentityPolicy::Abort => {
                error!("{e}; aborting before any fetch");
                Err(e)
            }
            IdentityPolicy::Continue => {
                warn!("{e}; continuing with unverified anonymity");
                Ok(None)
            }
        },
    }
}

/// Sequential crawl over one run's site list.
pub struct Pipeline {
    config: Arc<CrawlConfig>,
    transport: Arc<dyn ProxyTransport>,
    sites: Arc<dyn SiteSource>,
    fetcher: Arc<dyn PageFetcher>,
    matcher: KeywordMatcher,
}

impl Pipeline {
    pub fn new(
        config: Arc<CrawlConfig>,
        transport: Arc<dyn ProxyTransport>,
        sites: Arc<dyn SiteSource>,
        fetcher: Arc<dyn PageFetcher>,
        matcher: KeywordMatcher,
    ) -> Self {
        Self {
            config,
            transport,
            sites,
            fetcher,
            matcher,
        }
    }

    /// Execute one run, starting with the identity check.
    ///
    /// Under [`IdentityPolicy::Abort`] an identity failure returns
    /// [`crate::error::CrawlError::Identity`] before anything is rotated or fetched.
    pub async fn run(&self) -> CrawlResult<RunSummary> {
        let identity =
            verify_identity(self.transport.as_ref(), self.config.identity_policy).await?;
        self.run_verified(identity).await
    }

    /// Execute one run whose identity check the caller already performed
    /// through [`verify_identity`].
    pub async fn run_verified(&self, identity: Option<ExitIdentity>) -> CrawlResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary {
            identity,
            ..Default::default()
        };

        let layout = RunLayout::from_config(&self.config);
        summary.rotated = RunRotator::new(layout.clone()).rotate()?.moved.len();

        if self.config.depth > 1 {
            warn!(
                depth = self.config.depth,
                "only seed sites are crawled; depth beyond one hop is ignored"
            );
        }
        if self.matcher.is_empty() {
            warn!("no keywords configured; nothing will be archived");
        }

        let sites = match self.sites.list_sites().await {
            Ok(sites) => sites,
            Err(e) => {
                error!("{e}; nothing to crawl");
                Vec::new()
            }
        };
        summary.sites = sites.len();

        let writer = ArchiveWriter::new(&layout.current, self.config.json_sidecar);

        for (idx, site) in sites.iter().enumerate() {
            debug!(n = idx + 1, of = sites.len(), site = %site.url, "fetching");
            let page = self.fetcher.fetch(site).await;

            match &page.status {
                FetchStatus::Success => summary.fetched += 1,
                FetchStatus::Timeout => {
                    summary.timeouts += 1;
                    warn!(site = %site.url, netloc = %site.netloc, "fetch timed out, skipping site");
                    continue;
                }
                FetchStatus::TransportError(reason) => {
                    summary.transport_errors += 1;
                    warn!(site = %site.url, "fetch failed, skipping site: {reason}");
                    continue;
                }
            }

            let matches = self.matcher.matches(&page.matchable_text());
            if matches.is_empty() {
                debug!(site = %site.url, "no keywords found");
                continue;
            }

            summary.matched += 1;
            let keywords = matches
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            info!(site = %site.url, %keywords, "keyword match");

            match writer.write(site, &matches, &page, Local::now()) {
                Ok(artifact) => summary.artifacts.push(artifact),
                Err(e) if e.is_fatal() => {
                    error!(site = %site.url, "{e}; stopping run");
                    return Err(e);
                }
                Err(e) => warn!(site = %site.url, "could not archive page: {e}"),
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            sites = summary.sites,
            fetched = summary.fetched,
            timeouts = summary.timeouts,
            errors = summary.transport_errors,
            archived = summary.artifacts.len(),
            "run finished in {:.2}s",
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }
}
