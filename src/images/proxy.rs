use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use thiserror::Error;
use tokio::fs;

use crate::cache::store::PUBLIC_PREFIX;
use crate::cache::CacheStore;
use crate::images::fetcher::{detect_image_type, ImageFetchError, ImageFetcher};

/// Name suggested for images proxied from a remote host.
pub const REMOTE_DOWNLOAD_NAME: &str = "mapa_mental.jpg";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Empty image reference")]
    EmptyReference,

    #[error("Local file not found: {0}")]
    NotFound(String),

    #[error("Remote download failed: {0}")]
    Fetch(#[from] ImageFetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bytes to hand back to the caller as an attachment.
#[derive(Debug, Clone)]
pub struct Download {
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

/// Serves a cached file, or relays the remote bytes when only a URL is known.
pub struct DownloadProxy {
    store: Arc<CacheStore>,
    fetcher: Arc<dyn ImageFetcher>,
    timeout: Duration,
}

impl DownloadProxy {
    pub fn new(store: Arc<CacheStore>, fetcher: Arc<dyn ImageFetcher>, timeout: Duration) -> Self {
        Self { store, fetcher, timeout }
    }

    pub async fn resolve(&self, reference: &str) -> Result<Download, DownloadError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(DownloadError::EmptyReference);
        }

        if reference.starts_with(PUBLIC_PREFIX) {
            self.local(reference).await
        } else {
            self.remote(reference).await
        }
    }

    async fn local(&self, reference: &str) -> Result<Download, DownloadError> {
        let path = self
            .store
            .resolve_public(reference)
            .ok_or_else(|| DownloadError::NotFound(reference.to_string()))?;

        if !fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(DownloadError::NotFound(reference.to_string()));
        }

        let data = fs::read(&path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| REMOTE_DOWNLOAD_NAME.to_string());

        info!("Serving cached download: {}", reference);
        Ok(Download {
            content_type: detect_image_type(&data).to_string(),
            data,
            filename,
        })
    }

    async fn remote(&self, url: &str) -> Result<Download, DownloadError> {
        let image = self.fetcher.fetch(url, self.timeout).await.map_err(|e| {
            error!("Proxy download failed for {}: {}", url, e);
            e
        })?;

        let content_type = image
            .content_type
            .unwrap_or_else(|| detect_image_type(&image.data).to_string());

        info!("Proxied remote download: {}", url);
        Ok(Download {
            data: image.data,
            content_type,
            filename: REMOTE_DOWNLOAD_NAME.to_string(),
        })
    }
}
