//! Rendered page fetch: navigate, settle, capture, extract.
//!
//! One browser serves the whole run; every site gets a fresh tab which is
//! closed before the next site starts, whatever the outcome. Dynamic content
//! is given a fixed `pause` to settle; there is no readiness polling.

use crate::proxy::TimeoutPolicy;
use crate::renderer::{RenderError, Renderer};
use crate::sites::Site;
use async_trait::async_trait;
use scraper::{Html, Node, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Title used when a page has no `<title>`.
pub const NO_TITLE: &str = "No Title";

/// Elements whose text never counts as page content.
const NON_CONTENT: &[&str] = &["script", "style", "noscript", "template"];

/// Outcome class of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Success,
    Timeout,
    TransportError(String),
}

/// Everything captured for one site in one run.
#[derive(Debug, Clone)]
pub struct PageFetchResult {
    pub raw_markup: String,
    pub extracted_text: String,
    pub title: String,
    pub status: FetchStatus,
}

impl PageFetchResult {
    pub fn failed(status: FetchStatus) -> Self {
        Self {
            raw_markup: String::new(),
            extracted_text: String::new(),
            title: NO_TITLE.to_string(),
            status,
        }
    }

    /// Build a successful result from rendered markup.
    pub fn from_markup(markup: String) -> Self {
        let document = Html::parse_document(&markup);
        Self {
            extracted_text: extract_text(&document),
            title: extract_title(&document),
            raw_markup: markup,
            status: FetchStatus::Success,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// Lowercased copy of the extracted text, the form keyword matching expects.
    pub fn matchable_text(&self) -> String {
        self.extracted_text.to_lowercase()
    }
}

/// Produces a [`PageFetchResult`] for a site. Never fails: errors are a status.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, site: &Site) -> PageFetchResult;
}

/// Fetcher backed by a script-executing browser.
pub struct RenderedFetcher {
    renderer: Arc<dyn Renderer>,
    timeouts: TimeoutPolicy,
    pause: Duration,
}

impl RenderedFetcher {
    pub fn new(renderer: Arc<dyn Renderer>, timeouts: TimeoutPolicy, pause: Duration) -> Self {
        Self {
            renderer,
            timeouts,
            pause,
        }
    }

    async fn render(&self, site: &Site) -> Result<String, RenderError> {
        let mut ctx = self.renderer.new_context().await?;
        let timeout = self.timeouts.timeout_for(site);

        let captured = async {
            let nav = ctx.navigate(&site.url, timeout).await?;
            debug!(site = %site.url, final_url = %nav.final_url, load_ms = nav.load_time_ms, "page loaded");
            tokio::time::sleep(self.pause).await;
            ctx.get_html().await
        }
        .await;

        let _ = ctx.close().await;
        captured
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch(&self, site: &Site) -> PageFetchResult {
        match self.render(site).await {
            Ok(markup) => PageFetchResult::from_markup(markup),
            Err(RenderError::Timeout(_)) => PageFetchResult::failed(FetchStatus::Timeout),
            Err(e) => PageFetchResult::failed(FetchStatus::TransportError(e.to_string())),
        }
    }
}

/// Visible text of a document, whitespace flattened to single spaces.
pub fn extract_text(document: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| NON_CONTENT.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

/// `<title>` text, or [`NO_TITLE`].
pub fn extract_title(document: &Html) -> String {
    let Ok(sel) = Selector::parse("title") else {
        return NO_TITLE.to_string();
    };
    document
        .select(&sel)
        .next()
        .map(|t| t.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}
