use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use thiserror::Error;
use tokio::fs;

use crate::cache::naming::CacheKey;
use crate::images::{ImageFetchError, ImageFetcher};
use crate::models::search::CachedFile;

/// Folder below the cache root holding one sub-folder per search term.
pub const CACHE_DIR: &str = "mapas_salvos";

/// URL prefix under which the cache root is exposed.
pub const PUBLIC_PREFIX: &str = "/static/";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Fetch(#[from] ImageFetchError),

    #[error("Download timed out after {0:?}")]
    Timeout(Duration),
}

/// Disk cache of downloaded images, keyed by (term, index).
pub struct CacheStore {
    root: PathBuf,
    fetcher: Arc<dyn ImageFetcher>,
    fill_timeout: Duration,
}

impl CacheStore {
    /// Creates `<root>/mapas_salvos` if it does not exist yet.
    pub fn new(
        root: impl Into<PathBuf>,
        fetcher: Arc<dyn ImageFetcher>,
        fill_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(root.join(CACHE_DIR))?;

        Ok(Self {
            root,
            fetcher,
            fill_timeout,
        })
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn public_path(key: &CacheKey) -> String {
        format!("{}{}/{}/{}", PUBLIC_PREFIX, CACHE_DIR, key.folder, key.file)
    }

    /// Returns the public path of the cached image, downloading it first on a miss.
    ///
    /// `None` means nothing is cached locally and the caller should fall back to
    /// `remote_url`. Failures are logged, never propagated.
    pub async fn get_or_fetch(&self, remote_url: &str, term: &str, index: usize) -> Option<String> {
        match self.try_get_or_fetch(remote_url, term, index).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to cache image {}: {}", remote_url, e);
                None
            }
        }
    }

    async fn try_get_or_fetch(&self, remote_url: &str, term: &str, index: usize) -> Result<String, CacheError> {
        let key = CacheKey::new(term, index);
        let folder = self.downloads_dir().join(&key.folder);
        fs::create_dir_all(&folder).await?;

        let full_path = folder.join(&key.file);
        let public_path = Self::public_path(&key);

        if fs::try_exists(&full_path).await? {
            debug!("Cache hit: {}", public_path);
            return Ok(public_path);
        }

        let image = tokio::time::timeout(self.fill_timeout, self.fetcher.fetch(remote_url, self.fill_timeout))
            .await
            .map_err(|_| CacheError::Timeout(self.fill_timeout))??;

        write_atomic(&full_path, &image.data).await?;
        info!("Image saved: {}", public_path);

        Ok(public_path)
    }

    /// Maps a `/static/...` reference to its file below the cache root.
    ///
    /// Returns `None` for references outside the prefix or escaping the root.
    pub fn resolve_public(&self, reference: &str) -> Option<PathBuf> {
        let relative = reference.strip_prefix(PUBLIC_PREFIX)?;
        self.resolve_relative(Path::new(relative))
    }

    /// Joins `relative` onto the cache root, rejecting absolute and `..` paths.
    pub fn resolve_relative(&self, relative: &Path) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }

        if path == self.root {
            return None;
        }
        Some(path)
    }

    /// Lists every cached file grouped by term folder.
    pub async fn list(&self) -> Result<BTreeMap<String, Vec<CachedFile>>, CacheError> {
        let mut folders = BTreeMap::new();
        let downloads = self.downloads_dir();
        if !fs::try_exists(&downloads).await? {
            return Ok(folders);
        }

        let mut entries = fs::read_dir(&downloads).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let folder = entry.file_name().to_string_lossy().into_owned();

            let mut files = Vec::new();
            let mut inner = fs::read_dir(entry.path()).await?;
            while let Some(file) = inner.next_entry().await? {
                let name = file.file_name().to_string_lossy().into_owned();
                if name.ends_with(".tmp") {
                    continue;
                }
                let metadata = file.metadata().await?;
                files.push(CachedFile {
                    url: format!("{}{}/{}/{}", PUBLIC_PREFIX, CACHE_DIR, folder, name),
                    name,
                    size_bytes: metadata.len(),
                    exists: metadata.is_file(),
                    modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
            files.sort_by(|a, b| a.name.cmp(&b.name));
            folders.insert(folder, files);
        }

        Ok(folders)
    }
}

// Readers of `path` see either nothing or the complete file.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let temp = PathBuf::from(temp);

    if let Err(e) = fs::write(&temp, data).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}
