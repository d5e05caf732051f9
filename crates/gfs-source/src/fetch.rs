//! Partition retrieval.
//!
//! The source never retries on its own; retry and backoff live here, in the
//! transport, so a failure reaching the source is final.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors raised while retrieving a partition.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Giving up after {attempts} attempts: {last}")]
    Retries {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could succeed.
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(_) => true,
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Retrieves the raw bytes behind a partition URL.
#[async_trait]
pub trait PartitionFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<Bytes>;
}

/// Configuration for HTTP retrieval.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(60),
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP(S) fetcher with exponential backoff.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &str) -> FetchResult<Bytes> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl PartitionFetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> FetchResult<Bytes> {
        let mut attempt = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(bytes) => {
                    debug!(bytes = bytes.len(), attempt, "Fetched partition");
                    return Ok(bytes);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt > self.config.max_retries {
                        return Err(FetchError::Retries {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    warn!(
                        error = %e,
                        retry = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Fetch failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }
}

/// Reads partitions from a local mirror (`file://` URLs or plain paths).
#[derive(Debug, Clone, Default)]
pub struct LocalFetcher {
    /// Base directory for relative paths.
    root: Option<PathBuf>,
}

impl LocalFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl PartitionFetcher for LocalFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Bytes> {
        let path = self.resolve(url);
        debug!(path = %path.display(), "Reading local partition");
        Ok(Bytes::from(tokio::fs::read(&path).await?))
    }
}

/// Dispatches by URL scheme: `http(s)://` to HTTP, `file://` and bare paths
/// to the local filesystem.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    http: HttpFetcher,
    local: LocalFetcher,
}

impl DefaultFetcher {
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        Ok(Self {
            http: HttpFetcher::new(config)?,
            local: LocalFetcher::new(),
        })
    }
}

#[async_trait]
impl PartitionFetcher for DefaultFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Bytes> {
        match url.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase()) {
            Some(scheme) if scheme == "http" || scheme == "https" => self.http.fetch(url).await,
            Some(scheme) if scheme == "file" => self.local.fetch(url).await,
            Some(scheme) => Err(FetchError::UnsupportedScheme(scheme)),
            None => self.local.fetch(url).await,
        }
    }
}
