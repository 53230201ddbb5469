use std::path::PathBuf;
use std::sync::Arc;

use rocket::fs::NamedFile;
use rocket::serde::json::Json;
use rocket::State;

use crate::api::ApiError;
use crate::cache::CacheStore;
use crate::images::DownloadError;
use crate::models::search::CacheListing;

#[get("/static/<path..>")]
pub async fn static_file(path: PathBuf, store: &State<Arc<CacheStore>>) -> Result<NamedFile, ApiError> {
    let not_found = || DownloadError::NotFound(path.display().to_string());

    let full_path = store
        .resolve_relative(&path)
        .filter(|p| p.is_file())
        .ok_or_else(not_found)?;
    NamedFile::open(&full_path).await.map_err(|_| not_found().into())
}

/// Everything currently cached, grouped by term folder.
#[get("/debug/imagens")]
pub async fn list_cached(store: &State<Arc<CacheStore>>) -> Result<Json<CacheListing>, ApiError> {
    let downloads = store.downloads_dir();
    let imagens = store.list().await?;

    Ok(Json(CacheListing {
        total_pastas: imagens.len(),
        imagens,
        pasta_downloads: downloads.display().to_string(),
        pasta_existe: downloads.is_dir(),
    }))
}
