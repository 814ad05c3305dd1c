use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network failure fetching {path}: {reason}")]
    Network { path: String, reason: String },

    #[error("Invalid resource path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Raw response to a fetch: an HTTP-style status plus the body
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }

    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }
}

/// Asynchronous byte source for every model resource
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Retrieve `path`. An error status is a successful fetch; only transport
    /// failures return `Err`.
    async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError>;
}

/// Fetch `path`, turning an HTTP error status into a logged empty buffer
pub async fn fetch_bytes(fetcher: &dyn ResourceFetcher, path: &str) -> Result<Bytes, FetchError> {
    let response = fetcher.fetch(path).await?;
    if response.is_error_status() {
        error!("❌ Failed to load file {} (HTTP {})", path, response.status);
        return Ok(Bytes::new());
    }
    debug!("📥 Fetched {} ({} bytes)", path, response.body.len());
    Ok(response.body)
}

/// Fetches resources relative to a base URL
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        self.base.join(path).map_err(|e| FetchError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError> {
        let url = self.resolve(path)?;
        let network = |e: reqwest::Error| FetchError::Network {
            path: path.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(network)?;
        Ok(FetchResponse { status, body })
    }
}

/// Fetches resources from disk relative to `root`; a missing file answers 404
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ResourceFetcher for FileFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError> {
        let full_path = self.root.join(path);
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(FetchResponse::ok(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FetchResponse::status(404)),
            Err(e) => Err(FetchError::Network {
                path: full_path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
