// Copyright 2026 Deepcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use deepcrawl_runtime::cli;
use deepcrawl_runtime::config::{ConfigOverrides, CrawlConfig, IdentityPolicy};
use deepcrawl_runtime::error::CrawlError;
use deepcrawl_runtime::logging;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "deepcrawl",
    about = "Deepcrawl: render candidate sites over Tor, archive keyword hits, serve them for review",
    version,
    after_help = "Run 'deepcrawl <command> --help' for details on each command.\nRun 'deepcrawl' with no command to crawl."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct RunArgs {
    /// Scrape depth (only the seed sites are crawled)
    #[arg(long, short = 'd', global = true)]
    depth: Option<u32>,

    /// Seconds to let dynamic content settle after navigation
    #[arg(long, short = 'p', global = true)]
    pause: Option<u64>,

    /// Output folder for the current run (rotated runs go to <folder>/old_runs)
    #[arg(long, short = 'f', global = true)]
    folder: Option<PathBuf>,

    /// SOCKS endpoint of the Tor daemon (host:port)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Markdown document listing the sites to crawl
    #[arg(long, global = true)]
    source: Option<String>,

    /// Keyword file, one keyword per line
    #[arg(long, short = 'k', global = true)]
    keywords: Option<PathBuf>,

    /// What to do if the proxy identity check fails (abort, continue)
    #[arg(long, global = true)]
    identity_policy: Option<IdentityPolicy>,

    /// Write a {url, title, text} JSON sidecar next to each archived page
    #[arg(long, global = true)]
    json: bool,

    /// Address the artifact server listens on
    #[arg(long, global = true)]
    listen: Option<SocketAddr>,

    /// Endpoint reporting the exit address our traffic uses
    #[arg(long, global = true)]
    identity_url: Option<String>,

    /// Fetch timeout in seconds for .onion sites
    #[arg(long, global = true)]
    onion_timeout: Option<u64>,

    /// Fetch timeout in seconds for ordinary sites
    #[arg(long, short = 't', global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the site list while serving archived pages (default)
    Crawl,
    /// Serve archived pages without crawling
    Serve,
    /// Check Chromium, keywords, and the proxy identity
    Check,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            depth: self.run.depth,
            pause_secs: self.run.pause,
            verbose: self.verbose,
            output_dir: self.run.folder.clone(),
            proxy: self.run.proxy.clone(),
            source_url: self.run.source.clone(),
            keywords_path: self.run.keywords.clone(),
            identity_policy: self.run.identity_policy,
            json_sidecar: self.run.json,
            listen: self.run.listen,
            identity_url: self.run.identity_url.clone(),
            proxy_only_timeout_secs: self.run.onion_timeout,
            standard_timeout_secs: self.run.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "deepcrawl", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(&cli).await;

    // Exit codes: 0=success, 2=identity abort, 3=filesystem, 4=renderer, 64=config, 1=other
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        let code = e
            .downcast_ref::<CrawlError>()
            .map(CrawlError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }

    result
}

async fn run(cli: &Cli) -> Result<()> {
    let config = CrawlConfig::resolve(cli.overrides())?;
    logging::init(config.verbose, cli.log_file.as_deref(), cli.log_json)?;

    match cli.command {
        None | Some(Commands::Crawl) => cli::crawl::run(config).await,
        Some(Commands::Serve) => cli::serve::run(&config).await,
        Some(Commands::Check) => cli::check::run(&config).await,
        Some(Commands::Completions { .. }) => Ok(()),
    }
}
