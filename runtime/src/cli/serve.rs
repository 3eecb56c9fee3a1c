//! `deepcrawl serve`: artifact server only, no crawl.

use crate::artifact::RunLayout;
use crate::config::CrawlConfig;
use crate::server;
use anyhow::Result;
use tracing::info;

pub async fn run(config: &CrawlConfig) -> Result<()> {
    let layout = RunLayout::from_config(config);
    server::start(config.listen, layout, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
    })
    .await
}
