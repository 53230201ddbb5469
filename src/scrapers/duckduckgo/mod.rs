use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::cache::TokenCache;
use crate::config::AppConfig;
use crate::images::fetcher::{ACCEPT, ACCEPT_LANGUAGE, REFERER};
use crate::models::search::CandidateImage;
use crate::scrapers::{ProviderError, SearchProvider};

const BASE_URL: &str = "https://duckduckgo.com";
const MAX_PAGES: usize = 10;
const TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

lazy_static! {
    static ref VQD_RE: Regex = Regex::new(r#"vqd=["']?([0-9-]+)["']?"#).unwrap();
    static ref NEXT_OFFSET_RE: Regex = Regex::new(r"[?&]s=(\d+)").unwrap();
}

#[derive(Debug, Deserialize)]
struct ImagesPage {
    #[serde(default)]
    results: Vec<CandidateImage>,
    #[serde(default)]
    next: Option<String>,
}

/// DuckDuckGo image search through its `i.js` JSON endpoint.
pub struct DuckDuckGoImages {
    client: Client,
    tokens: TokenCache,
    region: String,
    safesearch: String,
}

impl DuckDuckGoImages {
    pub fn new(config: &AppConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.search_timeout())
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            tokens: TokenCache::new(TOKEN_TTL),
            region: config.search_region.clone(),
            safesearch: config.search_safesearch.clone(),
        })
    }

    async fn token(&self, query: &str) -> Result<String, ProviderError> {
        if let Some(token) = self.tokens.get(query) {
            debug!("Reusing search token for '{}'", query);
            return Ok(token);
        }

        let response = self
            .client
            .get(BASE_URL)
            .query(&[("q", query)])
            .header("Accept", ACCEPT)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Referer", REFERER)
            .send()
            .await?;

        let status = response.status();
        check_status(status)?;

        let html = response.text().await?;
        let token = extract_vqd(&html).ok_or_else(|| ProviderError::TokenNotFound(query.to_string()))?;
        self.tokens.store(query, token.clone());

        Ok(token)
    }

    async fn fetch_page(&self, query: &str, token: &str, offset: Option<String>) -> Result<ImagesPage, ProviderError> {
        let mut params = vec![
            ("l", self.region.as_str()),
            ("o", "json"),
            ("q", query),
            ("vqd", token),
            ("f", ",,,,,,"),
            ("p", safesearch_param(&self.safesearch)),
        ];
        if let Some(offset) = offset.as_deref() {
            params.push(("s", offset));
        }

        let response = self
            .client
            .get(format!("{}/i.js", BASE_URL))
            .query(&params)
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Referer", REFERER)
            .send()
            .await?;

        check_status(response.status())?;

        response
            .json::<ImagesPage>()
            .await
            .map_err(|e| ProviderError::ParsingError(format!("Invalid image results: {}", e)))
    }
}

impl DuckDuckGoImages {
    /// Keeps whatever was gathered before a failure; only an empty harvest is an error.
    fn settle(&self, query: &str, collected: Collected) -> Result<Vec<CandidateImage>, ProviderError> {
        let Some(e) = collected.failure else {
            return Ok(collected.results);
        };

        // A stale token surfaces as a rejected request; drop it so the next search refreshes it.
        self.tokens.invalidate(query);
        if collected.results.is_empty() {
            return Err(e);
        }
        warn!(
            "Stopping after {} results for '{}': {}",
            collected.results.len(),
            query,
            e
        );
        Ok(collected.results)
    }
}

/// Results gathered across pages, plus the error that cut paging short, if any.
struct Collected {
    results: Vec<CandidateImage>,
    failure: Option<ProviderError>,
}

/// Follows the `next` cursor until `max_results` distinct images are gathered,
/// the cursor runs out, a page fails, or `MAX_PAGES` pages were read.
async fn collect_pages<F, Fut>(max_results: usize, mut fetch_page: F) -> Collected
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ImagesPage, ProviderError>>,
{
    let mut seen = HashSet::new();
    let mut results = Vec::new();
    let mut offset: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let batch = match fetch_page(offset.take()).await {
            Ok(batch) => batch,
            Err(e) => {
                return Collected {
                    results,
                    failure: Some(e),
                }
            }
        };

        merge_unique(&mut results, &mut seen, batch.results, max_results);
        if results.len() >= max_results {
            break;
        }

        offset = match batch.next.as_deref().and_then(next_offset) {
            Some(next) => Some(next),
            None => break,
        };
    }

    Collected {
        results,
        failure: None,
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoImages {
    async fn images(&self, query: &str, max_results: usize) -> Result<Vec<CandidateImage>, ProviderError> {
        info!("Searching DuckDuckGo images for '{}' (max_results={})", query, max_results);

        let token = self.token(query).await?;
        let collected = collect_pages(max_results, |offset| self.fetch_page(query, &token, offset)).await;
        let results = self.settle(query, collected)?;

        debug!("DuckDuckGo returned {} images for '{}'", results.len(), query);
        Ok(results)
    }
}

fn check_status(status: StatusCode) -> Result<(), ProviderError> {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        error!("Rate limited by DuckDuckGo, status: {}", status);
        return Err(ProviderError::RateLimited);
    }
    if !status.is_success() {
        error!("DuckDuckGo request failed, status: {}", status);
        return Err(ProviderError::ParsingError(format!("HTTP error status: {}", status)));
    }
    Ok(())
}

fn extract_vqd(html: &str) -> Option<String> {
    VQD_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn next_offset(next: &str) -> Option<String> {
    NEXT_OFFSET_RE
        .captures(next)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn safesearch_param(safesearch: &str) -> &'static str {
    if safesearch.eq_ignore_ascii_case("off") {
        "-1"
    } else {
        "1"
    }
}

// Keeps provider order, dropping repeats of an already seen image URL.
fn merge_unique(
    results: &mut Vec<CandidateImage>,
    seen: &mut HashSet<String>,
    batch: Vec<CandidateImage>,
    max_results: usize,
) {
    for candidate in batch {
        if results.len() >= max_results {
            break;
        }
        if let Some(image) = &candidate.image {
            if !seen.insert(image.clone()) {
                continue;
            }
        }
        results.push(candidate);
    }
}
