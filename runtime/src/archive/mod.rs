//! Archive writer for pages that matched at least one keyword.
//!
//! File names are `<YYYYmmdd_HHMMSS>_<kw1>_<kw2>..._<netloc>.html`, every
//! component sanitised to filesystem-safe characters. Two writes for the
//! same site and keywords within one second share a name; the later wins.

pub mod pretty;

use crate::artifact::{ArchivedArtifact, ArtifactKind, PARTIAL_PREFIX};
use crate::error::{CrawlError, CrawlResult};
use crate::fetcher::PageFetchResult;
use crate::matcher::Keyword;
use crate::sites::Site;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Joins keywords inside a file name.
pub const KEYWORD_SEPARATOR: &str = "_";

/// Upper bound on a file stem, well under common 255-byte name limits.
const MAX_STEM_BYTES: usize = 200;

/// Sidecar payload.
#[derive(Debug, Serialize)]
struct PageRecord<'a> {
    url: &'a str,
    title: &'a str,
    text: &'a str,
}

/// Writes artifacts into one run directory.
pub struct ArchiveWriter {
    run_dir: PathBuf,
    json_sidecar: bool,
}

impl ArchiveWriter {
    pub fn new(run_dir: impl Into<PathBuf>, json_sidecar: bool) -> Self {
        Self {
            run_dir: run_dir.into(),
            json_sidecar,
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Persist a matched page. `matches` is expected to be non-empty.
    pub fn write(
        &self,
        site: &Site,
        matches: &[Keyword],
        page: &PageFetchResult,
        timestamp: DateTime<Local>,
    ) -> CrawlResult<ArchivedArtifact> {
        debug_assert!(!matches.is_empty(), "archiving a page without matches");

        std::fs::create_dir_all(&self.run_dir).map_err(|e| CrawlError::fs(&self.run_dir, e))?;

        let stem = artifact_stem(&timestamp, matches, &site.netloc);
        let filename = format!("{stem}.{}", ArtifactKind::Html.extension());
        let html = pretty::prettify(&page.raw_markup);
        write_atomic(&self.run_dir, &filename, html.as_bytes())?;

        let json_filename = if self.json_sidecar {
            let name = format!("{stem}.{}", ArtifactKind::Json.extension());
            let record = PageRecord {
                url: &site.url,
                title: &page.title,
                text: &page.extracted_text,
            };
            let body = serde_json::to_vec_pretty(&record)
                .map_err(|e| CrawlError::fs(self.run_dir.join(&name), std::io::Error::other(e)))?;
            write_atomic(&self.run_dir, &name, &body)?;
            Some(name)
        } else {
            None
        };

        info!(file = %filename, site = %site.url, "archived");

        Ok(ArchivedArtifact {
            filename,
            json_filename,
            site_url: site.url.clone(),
            site_netloc: site.netloc.clone(),
            matched_keywords: matches.to_vec(),
            timestamp,
        })
    }
}

/// File stem for an artifact, without extension.
pub fn artifact_stem(timestamp: &DateTime<Local>, keywords: &[Keyword], netloc: &str) -> String {
    let joined = keywords
        .iter()
        .map(|k| sanitize_component(k.as_str()))
        .collect::<Vec<_>>()
        .join(KEYWORD_SEPARATOR);
    let stamp = timestamp.format("%Y%m%d_%H%M%S").to_string();
    let netloc = sanitize_component(netloc);
    // Only the keyword run gives way, so distinct sites never share a stem.
    let fixed = stamp.len() + netloc.len() + 2 * KEYWORD_SEPARATOR.len();
    let joined = truncate_on_char_boundary(joined, MAX_STEM_BYTES.saturating_sub(fixed));
    truncate_on_char_boundary(format!("{stamp}_{joined}_{netloc}"), MAX_STEM_BYTES)
}

/// Replace everything but alphanumerics and `-` with `_`.
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn truncate_on_char_boundary(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

/// Write under a hidden temporary name, then rename into place.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> CrawlResult<()> {
    let partial = dir.join(format!("{PARTIAL_PREFIX}{name}"));
    let target = dir.join(name);
    std::fs::write(&partial, bytes).map_err(|e| CrawlError::fs(&partial, e))?;
    std::fs::rename(&partial, &target).map_err(|e| CrawlError::fs(&target, e))
}
