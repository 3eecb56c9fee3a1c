//! `deepcrawl check`: verify the environment before a run.

use crate::config::CrawlConfig;
use crate::matcher::load_keywords;
use crate::proxy::{ProxyTransport, SocksTransport};
use crate::renderer::chromium::find_chromium;
use anyhow::Result;

/// Check Chromium, keywords, and that traffic leaves through the proxy.
///
/// A failed proxy check surfaces as [`CrawlError::Identity`](crate::error::CrawlError::Identity), so the exit
/// status matches an aborted crawl.
pub async fn run(config: &CrawlConfig) -> Result<()> {
    println!("Deepcrawl Check");
    println!("===============");
    println!();

    match find_chromium() {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Set DEEPCRAWL_CHROMIUM_PATH or install chromium."),
    }

    let keywords = load_keywords(&config.keywords_path);
    if keywords.is_empty() {
        println!(
            "[!!] No keywords in {}; nothing would be archived",
            config.keywords_path.display()
        );
    } else {
        println!(
            "[OK] {} keyword(s) in {}",
            keywords.len(),
            config.keywords_path.display()
        );
    }

    println!("[..] Checking identity through {}", config.proxy);
    let transport = SocksTransport::new(config)?;
    match transport.check_identity().await {
        Ok(identity) => {
            println!("[OK] Exit address: {}", identity.address);
            println!();
            println!("Status: READY");
            Ok(())
        }
        Err(e) => {
            println!("[!!] {e}");
            println!();
            println!("Status: NOT READY");
            Err(e.into())
        }
    }
}
