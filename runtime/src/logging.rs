//! Tracing subscriber setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "deepcrawl=debug,deepcrawl_runtime=debug,tower_http=debug"
    } else {
        "deepcrawl=info,deepcrawl_runtime=info"
    }
}

/// Install the global subscriber: stderr, or append to `log_file` without colors.
/// `json` switches to one JSON object per event.
pub fn init(verbose: bool, log_file: Option<&Path>, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file: {}", path.display()))?;
            install(filter, Arc::new(file), false, json)
        }
        None => install(filter, std::io::stderr, true, json),
    }
}

fn install<W>(filter: EnvFilter, writer: W, ansi: bool, json: bool) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.with_ansi(ansi).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}
