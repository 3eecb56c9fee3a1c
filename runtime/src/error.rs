// Copyright 2026 Deepcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for a crawl run.
//!
//! Per-site failures (`FetchTimeout`, `Fetch`) are recoverable: the pipeline
//! logs them and moves on. `Filesystem` is fatal for the run because the
//! artifact server depends on a consistent on-disk layout. `NotFound` is an
//! ordinary client-facing outcome of the artifact server.

use std::path::PathBuf;

/// Process exit status for an identity-check abort.
pub const EXIT_IDENTITY: i32 = 2;
/// Process exit status for a fatal filesystem error.
pub const EXIT_FILESYSTEM: i32 = 3;
/// Process exit status when the rendering engine cannot be launched.
pub const EXIT_RENDERER: i32 = 4;
/// Process exit status for invalid configuration (EX_USAGE).
pub const EXIT_CONFIG: i32 = 64;

/// All errors a crawl run can surface.
#[derive(thiserror::Error, Debug)]
pub enum CrawlError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {secs}s fetching {url}")]
    FetchTimeout { url: String, secs: u64 },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("identity check failed: {0}")]
    Identity(String),

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer error: {0}")]
    Renderer(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl CrawlError {
    /// Wrap an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Exit status the binary reports when this error ends the process.
    pub fn exit_code(&self) -> i32 {
        match self {
            CrawlError::Identity(_) => EXIT_IDENTITY,
            CrawlError::Filesystem { .. } => EXIT_FILESYSTEM,
            CrawlError::Renderer(_) => EXIT_RENDERER,
            CrawlError::Config(_) => EXIT_CONFIG,
            CrawlError::Network(_)
            | CrawlError::FetchTimeout { .. }
            | CrawlError::Fetch { .. }
            | CrawlError::NotFound(_) => 1,
        }
    }

    /// True for failures that should stop the run rather than skip a site.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CrawlError::Filesystem { .. } | CrawlError::Renderer(_) | CrawlError::Config(_)
        )
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;
