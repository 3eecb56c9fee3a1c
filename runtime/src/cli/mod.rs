//! CLI subcommand implementations for the deepcrawl binary.

pub mod check;
pub mod crawl;
pub mod serve;
