#[macro_use]
extern crate rocket;

pub mod api;
pub mod cache;
pub mod config;
pub mod cors;
pub mod images;
pub mod models;
pub mod scrapers;
pub mod search;

use std::sync::Arc;

use log::info;
use rocket::figment::Provider;
use rocket::{Build, Rocket};

use cache::{CacheError, CacheStore};
use config::AppConfig;
use cors::CORS;
use images::{DownloadProxy, ImageFetcher};
use scrapers::SearchProvider;
use search::SearchPipeline;

/// Wires the cache, pipeline and download proxy into a Rocket instance.
///
/// Fails only when the cache directory cannot be created.
pub fn build_rocket<P: Provider>(
    figment: P,
    config: &AppConfig,
    provider: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn ImageFetcher>,
) -> Result<Rocket<Build>, CacheError> {
    let store = Arc::new(CacheStore::new(
        config.cache_root.clone(),
        fetcher.clone(),
        config.fetch_timeout(),
    )?);
    info!("Images will be saved in {}", store.downloads_dir().display());

    let pipeline = SearchPipeline::new(provider, store.clone());
    let download_proxy = DownloadProxy::new(store.clone(), fetcher, config.proxy_timeout());

    Ok(rocket::custom(figment)
        .attach(CORS)
        .manage(pipeline)
        .manage(download_proxy)
        .manage(store)
        .mount(
            "/",
            routes![
                api::search::search,
                api::download::download_image,
                api::files::static_file,
                api::files::list_cached,
            ],
        ))
}
