//! Transport seam.
//!
//! Everything the ingestion pipeline downloads (payloads, terrain blobs,
//! models) goes through a `Fetcher`. Credentials, retries and proxies belong
//! to the implementation, not to the pipeline.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("upstream HTTP {status} for {url}")]
    Http { url: String, status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("unsupported location: {0}")]
    Unsupported(String),
}

pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

impl<F: Fetcher> Fetcher for Arc<F> {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send {
        F::fetch(self, url)
    }
}

/// Reads resources from a directory tree. URLs are paths relative to `root`,
/// optionally prefixed with `file://`.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, FetchError> {
        if url.contains("://") && !url.starts_with("file://") {
            return Err(FetchError::Unsupported(url.to_string()));
        }
        let rel = Path::new(url.strip_prefix("file://").unwrap_or(url));
        // Stay inside the root.
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(FetchError::Unsupported(url.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl Fetcher for FsFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let path = self.resolve(url)?;
        debug!(path = %path.display(), "reading resource");
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(url.to_string()))
            }
            Err(err) => Err(FetchError::Io(format!("{}: {err}", path.display()))),
        }
    }
}

/// In-memory fetcher with per-URL request counts. Each fetch yields once
/// before resolving so concurrent callers genuinely interleave.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    resources: Mutex<HashMap<String, Result<Bytes, FetchError>>>,
    requests: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.resources.lock().insert(url.into(), Ok(data.into()));
    }

    /// Make `url` fail with `err` on every fetch.
    pub fn fail(&self, url: impl Into<String>, err: FetchError) {
        self.resources.lock().insert(url.into(), Err(err));
    }

    pub fn requests(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }
}

impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        *self.requests.lock().entry(url.to_string()).or_insert(0) += 1;
        tokio::task::yield_now().await;
        self.resources
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound(url.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchError, Fetcher, FsFetcher, MemoryFetcher};

    #[tokio::test]
    async fn fs_fetcher_reads_relative_paths() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("scene_fs_fetcher_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("terrain")).expect("create dir");
        std::fs::write(dir.join("terrain/a.bin"), b"abcd").expect("write");

        let fetcher = FsFetcher::new(&dir);
        let bytes = fetcher.fetch("terrain/a.bin").await.expect("read");
        assert_eq!(&bytes[..], b"abcd");
        let bytes = fetcher.fetch("file://terrain/a.bin").await.expect("read");
        assert_eq!(bytes.len(), 4);

        assert_eq!(
            fetcher.fetch("terrain/missing.bin").await,
            Err(FetchError::NotFound("terrain/missing.bin".to_string()))
        );
        assert!(matches!(
            fetcher.fetch("../escape.bin").await,
            Err(FetchError::Unsupported(_))
        ));
        assert!(matches!(
            fetcher.fetch("https://example.com/a.bin").await,
            Err(FetchError::Unsupported(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn memory_fetcher_counts_requests() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("a", &b"xyz"[..]);
        fetcher.fail("b", FetchError::Network("reset".to_string()));

        assert_eq!(&fetcher.fetch("a").await.expect("a")[..], b"xyz");
        assert!(fetcher.fetch("b").await.is_err());
        assert!(matches!(fetcher.fetch("c").await, Err(FetchError::NotFound(_))));
        assert_eq!(fetcher.requests("a"), 1);
        assert_eq!(fetcher.total_requests(), 3);
    }
}
