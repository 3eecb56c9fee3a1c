//! Run rotation: move the previous run's artifacts into cold storage.
//!
//! Rotation only relocates recognised artifacts. Other files in the current
//! directory are left alone, and nothing already in cold storage is ever
//! overwritten: a clashing name gets a numeric suffix instead.

use crate::artifact::{list_dir, RunLayout};
use crate::error::{CrawlError, CrawlResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What a rotation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// `(from, to)` for every moved file.
    pub moved: Vec<(PathBuf, PathBuf)>,
}

impl RotationReport {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
    }
}

/// Moves artifacts from the current directory into cold storage.
pub struct RunRotator {
    layout: RunLayout,
}

impl RunRotator {
    pub fn new(layout: RunLayout) -> Self {
        Self { layout }
    }

    /// Ensure both directories exist, then move every artifact out of `current`.
    ///
    /// Idempotent: with nothing new in `current`, a second call changes nothing.
    pub fn rotate(&self) -> CrawlResult<RotationReport> {
        rotate(&self.layout.current, &self.layout.cold)
    }
}

/// Free-function form of [`RunRotator::rotate`].
pub fn rotate(current: &Path, cold: &Path) -> CrawlResult<RotationReport> {
    std::fs::create_dir_all(cold).map_err(|e| CrawlError::fs(cold, e))?;
    std::fs::create_dir_all(current).map_err(|e| CrawlError::fs(current, e))?;

    let artifacts = list_dir(current).map_err(|e| CrawlError::fs(current, e))?;
    let mut report = RotationReport::default();

    for artifact in artifacts {
        let from = current.join(&artifact.name);
        let to = free_destination(cold, &artifact.name);
        std::fs::rename(&from, &to).map_err(|e| CrawlError::fs(&from, e))?;
        debug!(from = %from.display(), to = %to.display(), "rotated");
        report.moved.push((from, to));
    }

    if !report.is_empty() {
        info!(
            moved = report.moved.len(),
            cold = %cold.display(),
            "previous run moved to cold storage"
        );
    }
    Ok(report)
}

/// `cold/name`, or `cold/stem_N.ext` for the first N that is not taken.
fn free_destination(cold: &Path, name: &str) -> PathBuf {
    let candidate = cold.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let ext = as_path.extension().and_then(|s| s.to_str());

    (1u32..)
        .map(|n| match ext {
            Some(ext) => cold.join(format!("{stem}_{n}.{ext}")),
            None => cold.join(format!("{stem}_{n}")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
