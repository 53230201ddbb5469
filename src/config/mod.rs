use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    /// Directory served under `/static`; cached images live in `<cache_root>/mapas_salvos`.
    pub cache_root: PathBuf,
    /// Seconds allowed for a cache fill download.
    pub fetch_timeout: u64,
    /// Seconds allowed when proxying a remote image to the caller.
    pub proxy_timeout: u64,
    /// Seconds allowed for each request made to the search provider.
    pub search_timeout: u64,
    pub user_agent: String,
    pub search_region: String,
    pub search_safesearch: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            address: "127.0.0.1".to_string(),
            cache_root: PathBuf::from("static"),
            fetch_timeout: 5,
            proxy_timeout: 10,
            search_timeout: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            search_region: "wt-wt".to_string(),
            search_safesearch: "moderate".to_string(),
        }
    }
}

impl AppConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout)
    }
}
