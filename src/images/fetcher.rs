use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

// Browser identity sent with every image request; some hosts refuse bare clients.
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7";
pub const REFERER: &str = "https://duckduckgo.com/";

#[derive(Error, Debug)]
pub enum ImageFetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Image request failed with status: {0}")]
    BadStatus(StatusCode),

    #[error("Client error: {0}")]
    ClientError(String),
}

/// Raw image body plus the content type announced by the remote host, if any.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches `url`, failing on anything other than HTTP 200 or after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedImage, ImageFetchError>;
}

pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(user_agent: &str) -> Result<Self, ImageFetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ImageFetchError::ClientError(format!("Failed to build client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedImage, ImageFetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("Accept", ACCEPT)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Referer", REFERER)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            log::debug!("Image request to {} failed with status: {}", url, status);
            return Err(ImageFetchError::BadStatus(status));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());

        let data = response.bytes().await?.to_vec();

        Ok(FetchedImage { data, content_type })
    }
}

/// Guesses an image content type from its magic number, defaulting to JPEG.
pub fn detect_image_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if data.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
        "image/gif"
    } else if data.starts_with(&[0x52, 0x49, 0x46, 0x46]) && data.get(8..12) == Some(&[0x57, 0x45, 0x42, 0x50][..]) {
        "image/webp"
    } else if data.starts_with(&[0x42, 0x4D]) {
        "image/bmp"
    } else {
        "image/jpeg"
    }
}
