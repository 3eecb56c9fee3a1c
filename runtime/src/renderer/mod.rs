//! Renderer abstraction for script-executing page loads.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a render attempt failed.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("navigation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("browser session error: {0}")]
    Session(String),
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<(), RenderError>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL; the whole load is bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<NavigationResult, RenderError>;
    /// Get the full rendered page HTML.
    async fn get_html(&self) -> Result<String, RenderError>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}
