#[macro_use]
extern crate rocket;

use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::info;
use mapas::config::AppConfig;
use mapas::images::HttpImageFetcher;
use mapas::scrapers::DuckDuckGoImages;
use rocket::{
    figment::{
        providers::{Format, Toml},
        Figment, Profile,
    },
    Config,
};

#[launch]
async fn rocket() -> _ {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load config
    let mut figment = Figment::from(Config::default())
        .merge(Toml::file("App.toml").nested());

    if let Ok(cache_root) = env::var("CACHE_ROOT") {
        figment = figment.merge(("cache_root", cache_root));
    }

    if let Ok(region) = env::var("SEARCH_REGION") {
        figment = figment.merge(("search_region", region));
    }

    if let Ok(safesearch) = env::var("SEARCH_SAFESEARCH") {
        figment = figment.merge(("search_safesearch", safesearch));
    }

    figment = figment.select(Profile::from_env_or("APP_PROFILE", "default"));

    let config = figment.extract::<AppConfig>().expect("invalid configuration");
    info!("Configuration loaded successfully");

    let fetcher = Arc::new(HttpImageFetcher::new(&config.user_agent).expect("failed to build image client"));
    let provider = Arc::new(DuckDuckGoImages::new(&config).expect("failed to build search client"));

    info!(
        "Starting image search server on {}:{}",
        config.address, config.port
    );

    mapas::build_rocket(figment, &config, provider, fetcher).expect("failed to create cache directory")
}
