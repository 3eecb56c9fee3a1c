//! `deepcrawl crawl`: run the pipeline while serving artifacts.
//!
//! The artifact server starts first and keeps serving after the run ends,
//! until Ctrl-C. Ctrl-C during the run stops both; the open browser tab is
//! torn down with the browser, and no partial artifact is left behind since
//! artifacts are only written after a completed match.

use crate::artifact::RunLayout;
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::fetcher::{PageFetcher, RenderedFetcher};
use crate::matcher::{load_keywords, KeywordMatcher};
use crate::pipeline::{verify_identity, Pipeline, RunSummary};
use crate::proxy::{ProxyTransport, SocksTransport, TimeoutPolicy};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use crate::server;
use crate::sites::{SiteListProvider, SiteSource};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(config: CrawlConfig) -> Result<()> {
    let config = Arc::new(config);

    // Bind before crawling so a taken port fails the command up front.
    let listener = server::bind(config.listen).await?;
    let listening = listener.local_addr()?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server_task = tokio::spawn(server::serve(
        listener,
        RunLayout::from_config(&config),
        async move {
            let _ = stop_rx.changed().await;
        },
    ));

    let outcome = crawl(Arc::clone(&config)).await;

    let result = match outcome {
        Ok(Some(summary)) => {
            report(&summary);
            println!("Serving artifacts on http://{listening}; press Ctrl-C to quit");
            let _ = tokio::signal::ctrl_c().await;
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };

    let _ = stop_tx.send(true);
    match server_task.await {
        Ok(Err(e)) => warn!("artifact server stopped with error: {e:#}"),
        Err(e) => warn!("artifact server task failed: {e}"),
        Ok(Ok(())) => {}
    }
    result
}

/// Run one crawl; `Ok(None)` when interrupted by Ctrl-C.
async fn crawl(config: Arc<CrawlConfig>) -> Result<Option<RunSummary>> {
    let transport: Arc<dyn ProxyTransport> = Arc::new(SocksTransport::new(&config)?);
    // Settle anonymity before paying for a browser launch.
    let identity = verify_identity(transport.as_ref(), config.identity_policy).await?;

    let renderer = ChromiumRenderer::launch(&config.proxy)
        .await
        .map_err(|e| CrawlError::Renderer(e.to_string()))?;
    info!("Chromium renderer initialized");
    let renderer: Arc<dyn Renderer> = Arc::new(renderer);

    let fetcher: Arc<dyn PageFetcher> = Arc::new(RenderedFetcher::new(
        Arc::clone(&renderer),
        TimeoutPolicy::from_config(&config),
        config.pause(),
    ));
    let sites: Arc<dyn SiteSource> = Arc::new(SiteListProvider::new(
        config.source_url.clone(),
        Duration::from_secs(config.standard_timeout_secs),
    )?);
    let matcher = KeywordMatcher::new(load_keywords(&config.keywords_path));

    let pipeline = Pipeline::new(Arc::clone(&config), transport, sites, fetcher, matcher);

    let result = tokio::select! {
        res = pipeline.run_verified(identity) => Some(res),
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, abandoning run");
            None
        }
    };

    let _ = renderer.shutdown().await;
    match result {
        Some(res) => Ok(Some(res?)),
        None => Ok(None),
    }
}

fn report(summary: &RunSummary) {
    println!(
        "Crawled {} site(s): {} fetched, {} timed out, {} failed, {} archived",
        summary.sites,
        summary.fetched,
        summary.timeouts,
        summary.transport_errors,
        summary.artifacts.len()
    );
    for artifact in &summary.artifacts {
        let keywords = artifact
            .matched_keywords
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("  Keyword(s) '{keywords}' found in {}", artifact.site_url);
    }
    println!("Script took {:.2} seconds", summary.elapsed.as_secs_f64());
}
