//! Keyword matching.
//!
//! Plain case-insensitive substring containment, nothing more: no stemming,
//! no regex, no word boundaries.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

/// A configured keyword, kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keyword(String);

impl Keyword {
    pub fn new(raw: impl Into<String>) -> Self {
        Keyword(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keywords found in a page, in configuration order. Empty means "do not archive".
pub type MatchResult = Vec<Keyword>;

/// Matcher with keywords pre-lowered once per run.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<(Keyword, String)>,
}

impl KeywordMatcher {
    pub fn new(keywords: Vec<Keyword>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| {
                let lowered = k.as_str().to_lowercase();
                (k, lowered)
            })
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Keywords contained in `lowered_text`, which must already be lowercase.
    pub fn matches(&self, lowered_text: &str) -> MatchResult {
        self.keywords
            .iter()
            .filter(|(_, lowered)| lowered_text.contains(lowered.as_str()))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// One-shot form of [`KeywordMatcher::matches`] that lowercases both sides.
pub fn match_keywords(text: &str, keywords: &[Keyword]) -> MatchResult {
    KeywordMatcher::new(keywords.to_vec()).matches(&text.to_lowercase())
}

/// Parse a keyword list: one per line, trimmed, blank lines dropped.
pub fn parse_keywords(contents: &str) -> Vec<Keyword> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Keyword::new)
        .collect()
}

/// Read the keyword file. A missing or unreadable file yields no keywords.
pub fn load_keywords(path: &Path) -> Vec<Keyword> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let keywords = parse_keywords(&contents);
            info!(count = keywords.len(), path = %path.display(), "keywords loaded");
            keywords
        }
        Err(e) => {
            error!(path = %path.display(), "keywords file unreadable: {e}");
            Vec::new()
        }
    }
}
