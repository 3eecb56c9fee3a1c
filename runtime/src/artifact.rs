// Copyright 2026 Deepcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stored artifacts and the two-directory run layout.
//!
//! The active run writes flat files into `current`; rotation moves them to
//! `cold`. Both the rotator and the artifact server classify files through
//! [`ArtifactKind`] and resolve names through [`RunLayout`], so neither
//! does its own suffix matching or path joining.

use crate::config::CrawlConfig;
use crate::matcher::Keyword;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Prefix of in-progress files; such files are never artifacts.
pub const PARTIAL_PREFIX: &str = ".partial-";

/// Kind of file an archived page consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Pretty-printed rendered markup, always written.
    Html,
    /// `{url, title, text}` sidecar, written in rich-metadata mode.
    Json,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Html, ArtifactKind::Json];

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Html => "html",
            ArtifactKind::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Html => "text/html; charset=utf-8",
            ArtifactKind::Json => "application/json",
        }
    }

    /// Classify a bare file name. Hidden and in-progress files are never artifacts.
    pub fn of_file_name(name: &str) -> Option<Self> {
        if name.starts_with('.') {
            return None;
        }
        let ext = Path::new(name).extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|k| k.extension().eq_ignore_ascii_case(ext))
    }
}

/// A file found in one of the run directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub name: String,
    pub kind: ArtifactKind,
}

/// Which run a stored file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSlot {
    Current,
    Cold,
}

/// Metadata of one archived page.
#[derive(Debug, Clone, Serialize)]
pub struct ArchivedArtifact {
    /// HTML file name inside the run directory.
    pub filename: String,
    /// Sidecar file name when one was written.
    pub json_filename: Option<String>,
    pub site_url: String,
    pub site_netloc: String,
    pub matched_keywords: Vec<Keyword>,
    pub timestamp: DateTime<Local>,
}

/// The current and cold-storage directories of a deployment.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub current: PathBuf,
    pub cold: PathBuf,
}

impl RunLayout {
    pub fn new(current: impl Into<PathBuf>, cold: impl Into<PathBuf>) -> Self {
        Self {
            current: current.into(),
            cold: cold.into(),
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(&config.output_dir, &config.cold_dir)
    }

    pub fn dir(&self, slot: RunSlot) -> &Path {
        match slot {
            RunSlot::Current => &self.current,
            RunSlot::Cold => &self.cold,
        }
    }

    /// Artifacts of `kind` in a slot, in directory order. A missing directory is empty.
    pub fn list(&self, slot: RunSlot, kind: ArtifactKind) -> std::io::Result<Vec<StoredArtifact>> {
        Ok(list_dir(self.dir(slot))?
            .into_iter()
            .filter(|a| a.kind == kind)
            .collect())
    }

    /// Find a stored artifact by bare file name, current run first.
    ///
    /// Anything that is not a plain single-component name of a known kind,
    /// or that escapes a root through a symlink, resolves to `None`.
    pub fn resolve(&self, name: &str) -> Option<(PathBuf, ArtifactKind)> {
        let kind = ArtifactKind::of_file_name(name)?;
        if !is_plain_file_name(name) {
            return None;
        }
        [RunSlot::Current, RunSlot::Cold]
            .into_iter()
            .find_map(|slot| contained_file(self.dir(slot), name))
            .map(|path| (path, kind))
    }
}

/// Every recognised artifact directly inside `dir`, in directory order.
pub fn list_dir(dir: &Path) -> std::io::Result<Vec<StoredArtifact>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some(kind) = ArtifactKind::of_file_name(&name) {
            found.push(StoredArtifact { name, kind });
        }
    }
    Ok(found)
}

/// True when `name` is exactly one normal path component.
fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn contained_file(root: &Path, name: &str) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let path = root.join(name).canonicalize().ok()?;
    (path.starts_with(&root) && path.is_file()).then_some(path)
}
