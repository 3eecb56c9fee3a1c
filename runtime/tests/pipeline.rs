//! End-to-end pipeline runs against in-memory transport, site list, and fetcher.

use async_trait::async_trait;
use deepcrawl_runtime::config::{CrawlConfig, IdentityPolicy};
use deepcrawl_runtime::error::{CrawlError, CrawlResult};
use deepcrawl_runtime::fetcher::{FetchStatus, PageFetchResult, PageFetcher};
use deepcrawl_runtime::matcher::{Keyword, KeywordMatcher};
use deepcrawl_runtime::pipeline::{verify_identity, Pipeline};
use deepcrawl_runtime::proxy::{ExitIdentity, ProxyTransport};
use deepcrawl_runtime::sites::{Site, SiteSource};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

// ── Fakes ──

#[derive(Default)]
struct FakeTransport {
    identity_ok: bool,
    identity_checks: AtomicUsize,
}

#[async_trait]
impl ProxyTransport for FakeTransport {
    async fn fetch(&self, url: &str, _timeout: Duration) -> CrawlResult<Vec<u8>> {
        Err(CrawlError::Fetch {
            url: url.to_string(),
            reason: "not used".into(),
        })
    }

    async fn check_identity(&self) -> CrawlResult<ExitIdentity> {
        self.identity_checks.fetch_add(1, Ordering::SeqCst);
        if self.identity_ok {
            Ok(ExitIdentity {
                address: "185.220.101.1".into(),
                is_tor: Some(true),
            })
        } else {
            Err(CrawlError::Identity("proxy unreachable".into()))
        }
    }
}

struct FakeSites(CrawlResult<Vec<&'static str>>);

#[async_trait]
impl SiteSource for FakeSites {
    async fn list_sites(&self) -> CrawlResult<Vec<Site>> {
        match &self.0 {
            Ok(urls) => Ok(urls.iter().filter_map(|u| Site::parse(u)).collect()),
            Err(_) => Err(CrawlError::Network("directory unreachable".into())),
        }
    }
}

#[derive(Default)]
struct FakeFetcher {
    pages: HashMap<&'static str, FetchStatus>,
    fetches: AtomicUsize,
    /// Replaced by a plain file on the first fetch.
    sabotage: Option<PathBuf>,
}

impl FakeFetcher {
    fn with(pages: &[(&'static str, FetchStatus)]) -> Self {
        Self {
            pages: pages.iter().cloned().collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, site: &Site) -> PageFetchResult {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(dir) = &self.sabotage {
            let _ = std::fs::remove_dir_all(dir);
            std::fs::write(dir, b"in the way").unwrap();
        }
        match self.pages.get(site.url.as_str()) {
            Some(FetchStatus::Success) | None => PageFetchResult::from_markup(format!(
                "<html><head><title>{}</title></head><body><p>Fresh database breach posted</p></body></html>",
                site.netloc
            )),
            Some(other) => PageFetchResult::failed(other.clone()),
        }
    }
}

const ALPHA: &str = "http://alpha.onion/";
const BETA: &str = "http://beta.onion/";
const GAMMA: &str = "https://gamma.example/board";

fn config(root: &Path, policy: IdentityPolicy) -> Arc<CrawlConfig> {
    let output_dir = root.join("scraped_sites");
    Arc::new(CrawlConfig {
        cold_dir: output_dir.join("old_runs"),
        output_dir,
        identity_policy: policy,
        pause_secs: 0,
        ..Default::default()
    })
}

fn pipeline(
    config: Arc<CrawlConfig>,
    identity_ok: bool,
    sites: FakeSites,
    fetcher: Arc<FakeFetcher>,
) -> Pipeline {
    Pipeline::new(
        config,
        Arc::new(FakeTransport {
            identity_ok,
            ..Default::default()
        }),
        Arc::new(sites),
        fetcher,
        KeywordMatcher::new(vec![Keyword::new("Breach"), Keyword::new("ransom")]),
    )
}

fn html_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.ends_with(".html"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

// ── Log capture ──

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ── Tests ──

#[test]
fn test_timeout_skips_only_that_site() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Abort);
    let fetcher = Arc::new(FakeFetcher::with(&[(BETA, FetchStatus::Timeout)]));
    let pipeline = pipeline(
        Arc::clone(&config),
        true,
        FakeSites(Ok(vec![ALPHA, BETA, GAMMA])),
        Arc::clone(&fetcher),
    );

    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let summary = tracing::subscriber::with_default(subscriber, || rt.block_on(pipeline.run()))
        .unwrap();

    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(summary.sites, 3);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.timeouts, 1);
    assert_eq!(summary.artifacts.len(), 2);

    let files = html_files(&config.output_dir);
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.ends_with("_Breach_alpha_onion.html")));
    assert!(files.iter().any(|f| f.ends_with("_Breach_gamma_example.html")));
    assert!(!files.iter().any(|f| f.contains("beta")));

    assert_eq!(logs.contents().matches("fetch timed out, skipping site").count(), 1);
}

#[tokio::test]
async fn test_identity_abort_fetches_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Abort);
    std::fs::create_dir_all(&config.output_dir).unwrap();
    std::fs::write(config.output_dir.join("earlier.html"), "<html></html>").unwrap();

    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = pipeline(
        Arc::clone(&config),
        false,
        FakeSites(Ok(vec![ALPHA, GAMMA])),
        Arc::clone(&fetcher),
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, CrawlError::Identity(_)));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
    // Nothing rotated either.
    assert_eq!(html_files(&config.output_dir), vec!["earlier.html".to_string()]);
    assert!(!config.cold_dir.exists());
}

#[tokio::test]
async fn test_identity_continue_crawls_everything() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Continue);
    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = pipeline(
        Arc::clone(&config),
        false,
        FakeSites(Ok(vec![ALPHA, GAMMA])),
        Arc::clone(&fetcher),
    );

    let summary = pipeline.run().await.unwrap();
    assert!(summary.identity.is_none());
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(summary.artifacts.len(), 2);
}

#[tokio::test]
async fn test_site_list_failure_is_empty_run() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Abort);
    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = pipeline(
        Arc::clone(&config),
        true,
        FakeSites(Err(CrawlError::Network("down".into()))),
        Arc::clone(&fetcher),
    );

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.sites, 0);
    assert!(summary.artifacts.is_empty());
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rotation_precedes_new_artifacts() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Abort);
    std::fs::create_dir_all(&config.output_dir).unwrap();
    std::fs::write(config.output_dir.join("earlier.html"), "<html></html>").unwrap();

    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = pipeline(
        Arc::clone(&config),
        true,
        FakeSites(Ok(vec![GAMMA])),
        fetcher,
    );

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.rotated, 1);
    assert_eq!(html_files(&config.cold_dir), vec!["earlier.html".to_string()]);

    let current = html_files(&config.output_dir);
    assert_eq!(current.len(), 1);
    assert_eq!(current[0], summary.artifacts[0].filename);
}

#[tokio::test]
async fn test_transport_error_skips_site() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Abort);
    let fetcher = Arc::new(FakeFetcher::with(&[(
        ALPHA,
        FetchStatus::TransportError("connection refused".into()),
    )]));
    let pipeline = pipeline(
        Arc::clone(&config),
        true,
        FakeSites(Ok(vec![ALPHA, GAMMA])),
        fetcher,
    );

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.transport_errors, 1);
    assert_eq!(summary.artifacts.len(), 1);
    assert_eq!(summary.artifacts[0].site_netloc, "gamma.example");
}

#[tokio::test]
async fn test_filesystem_failure_stops_run() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Abort);
    let fetcher = Arc::new(FakeFetcher {
        sabotage: Some(config.output_dir.clone()),
        ..Default::default()
    });
    let pipeline = pipeline(
        Arc::clone(&config),
        true,
        FakeSites(Ok(vec![ALPHA, GAMMA])),
        Arc::clone(&fetcher),
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, CrawlError::Filesystem { .. }));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_verify_identity_applies_policy() {
    let down = FakeTransport::default();
    let err = verify_identity(&down, IdentityPolicy::Abort).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(verify_identity(&down, IdentityPolicy::Continue)
        .await
        .unwrap()
        .is_none());

    let up = FakeTransport {
        identity_ok: true,
        ..Default::default()
    };
    let identity = verify_identity(&up, IdentityPolicy::Abort).await.unwrap();
    assert_eq!(identity.unwrap().address, "185.220.101.1");
}

#[tokio::test]
async fn test_run_verified_skips_second_identity_check() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), IdentityPolicy::Abort);
    let transport = Arc::new(FakeTransport {
        identity_ok: true,
        ..Default::default()
    });
    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = Pipeline::new(
        Arc::clone(&config),
        transport.clone(),
        Arc::new(FakeSites(Ok(vec![GAMMA]))),
        fetcher,
        KeywordMatcher::new(vec![Keyword::new("breach")]),
    );

    let identity = verify_identity(transport.as_ref(), config.identity_policy)
        .await
        .unwrap();
    let summary = pipeline.run_verified(identity).await.unwrap();

    assert_eq!(transport.identity_checks.load(Ordering::SeqCst), 1);
    assert_eq!(summary.identity.unwrap().address, "185.220.101.1");
    assert_eq!(summary.artifacts.len(), 1);
}
