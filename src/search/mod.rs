use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::cache::CacheStore;
use crate::models::search::{CandidateImage, ImageResult, Provenance};
use crate::scrapers::SearchProvider;

/// Results per page; page `n` covers provider positions `[(n-1)*10, n*10)`.
pub const PAGE_SIZE: usize = 10;

/// Prepended to every term before it reaches the provider.
pub const QUERY_PREFIX: &str = "mapa mental";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Campo 'termo' é obrigatório.")]
    EmptyTerm,
}

/// A validated search: non-empty trimmed term and a page number of at least 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
    page: usize,
}

impl SearchQuery {
    /// Missing, zero, negative or unparsable pages are clamped to 1. Huge pages are
    /// kept; their offset saturates and simply lands past the last result.
    pub fn new(term: &str, page: Option<i64>) -> Result<Self, ValidationError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ValidationError::EmptyTerm);
        }

        let page = page.filter(|p| *p >= 1).map(|p| usize::try_from(p).unwrap_or(usize::MAX)).unwrap_or(1);

        Ok(Self {
            term: term.to_string(),
            page,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(PAGE_SIZE)
    }

    pub fn provider_query(&self) -> String {
        format!("{} {}", QUERY_PREFIX, self.term)
    }

    pub fn description(&self) -> String {
        format!("Arquivo: MAPA MENTAL SOBRE {}", self.term.to_uppercase())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
enum CandidateError {
    #[error("candidate has no image URL")]
    MissingImage,
}

pub struct SearchPipeline {
    provider: Arc<dyn SearchProvider>,
    store: Arc<CacheStore>,
}

impl SearchPipeline {
    pub fn new(provider: Arc<dyn SearchProvider>, store: Arc<CacheStore>) -> Self {
        Self { provider, store }
    }

    /// Validates the request and returns one page of results.
    pub async fn search(&self, term: &str, page: Option<i64>) -> Result<Vec<ImageResult>, ValidationError> {
        let query = SearchQuery::new(term, page)?;
        Ok(self.run(&query).await)
    }

    /// Never fails: provider errors yield an empty page, bad candidates are skipped.
    pub async fn run(&self, query: &SearchQuery) -> Vec<ImageResult> {
        let provider_query = query.provider_query();
        let offset = query.offset();
        info!("Image search: {} (offset={})", provider_query, offset);

        // The provider cannot skip results, so ask for everything up to the end of the page.
        let candidates = match self.provider.images(&provider_query, offset.saturating_add(PAGE_SIZE)).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Search provider failed for '{}': {}", provider_query, e);
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(PAGE_SIZE);
        for (i, candidate) in candidates.into_iter().skip(offset).take(PAGE_SIZE).enumerate() {
            let index = offset.saturating_add(i);
            match self.process_candidate(query, &provider_query, candidate, index).await {
                Ok(result) => results.push(result),
                Err(e) => debug!("Skipping result {}: {}", index, e),
            }
        }

        info!("Returning {} results for '{}' page {}", results.len(), query.term(), query.page());
        results
    }

    async fn process_candidate(
        &self,
        query: &SearchQuery,
        provider_query: &str,
        candidate: CandidateImage,
        index: usize,
    ) -> Result<ImageResult, CandidateError> {
        let remote = candidate
            .image
            .filter(|url| !url.trim().is_empty())
            .ok_or(CandidateError::MissingImage)?;

        let (image, provenance) = match self.store.get_or_fetch(&remote, query.term(), index).await {
            Some(local) => (local, Provenance::LocalCache),
            None => (remote.clone(), Provenance::RemoteFallback),
        };

        Ok(ImageResult {
            title: candidate
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| provider_query.to_string()),
            link: candidate.url.filter(|u| !u.is_empty()).unwrap_or(remote),
            image,
            provenance,
            description_original: query.description(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{FetchedImage, ImageFetchError, ImageFetcher};
    use crate::scrapers::ProviderError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct FakeProvider {
        candidates: Vec<CandidateImage>,
        fail: bool,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl FakeProvider {
        fn with(candidates: Vec<CandidateImage>) -> Arc<Self> {
            Arc::new(Self {
                candidates,
                fail: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                candidates: Vec::new(),
                fail: true,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for FakeProvider {
        async fn images(&self, query: &str, max_results: usize) -> Result<Vec<CandidateImage>, ProviderError> {
            self.calls.lock().push((query.to_string(), max_results));
            if self.fail {
                return Err(ProviderError::RateLimited);
            }
            Ok(self.candidates.iter().take(max_results).cloned().collect())
        }
    }

    /// Serves every URL except those containing "broken".
    struct FakeFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedImage, ImageFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                return Err(ImageFetchError::BadStatus(StatusCode::NOT_FOUND));
            }
            Ok(FetchedImage {
                data: url.as_bytes().to_vec(),
                content_type: None,
            })
        }
    }

    fn candidates(n: usize) -> Vec<CandidateImage> {
        (0..n)
            .map(|i| CandidateImage {
                title: Some(format!("Mapa {}", i)),
                image: Some(format!("https://img.example/{}.jpg", i)),
                url: Some(format!("https://site.example/{}", i)),
            })
            .collect()
    }

    fn pipeline(dir: &TempDir, provider: Arc<FakeProvider>) -> (SearchPipeline, Arc<FakeFetcher>) {
        let fetcher = Arc::new(FakeFetcher {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(CacheStore::new(dir.path(), fetcher.clone(), Duration::from_secs(5)).unwrap());
        (SearchPipeline::new(provider, store), fetcher)
    }

    #[test]
    fn query_validation_and_offsets() {
        assert_eq!(SearchQuery::new("", Some(1)), Err(ValidationError::EmptyTerm));
        assert_eq!(SearchQuery::new("   ", None), Err(ValidationError::EmptyTerm));

        let query = SearchQuery::new("  Sistema Nervoso ", None).unwrap();
        assert_eq!(query.term(), "Sistema Nervoso");
        assert_eq!(query.offset(), 0);
        assert_eq!(query.provider_query(), "mapa mental Sistema Nervoso");
        assert_eq!(query.description(), "Arquivo: MAPA MENTAL SOBRE SISTEMA NERVOSO");

        assert_eq!(SearchQuery::new("x", Some(3)).unwrap().offset(), 20);
        assert_eq!(SearchQuery::new("x", Some(0)).unwrap().page(), 1);
        assert_eq!(SearchQuery::new("x", Some(-4)).unwrap().page(), 1);
    }

    #[test]
    fn huge_pages_saturate_instead_of_overflowing() {
        let query = SearchQuery::new("Biologia", Some(i64::MAX)).unwrap();
        assert_eq!(query.offset(), usize::MAX);

        let page = serde_json::from_str::<crate::models::search::PageParam>("1e30").unwrap();
        let query = SearchQuery::new("Biologia", page.value()).unwrap();
        assert_eq!(query.offset(), usize::MAX);

        let page = serde_json::from_str::<crate::models::search::PageParam>("\"9223372036854775807\"").unwrap();
        assert_eq!(SearchQuery::new("Biologia", page.value()).unwrap().offset(), usize::MAX);
    }

    #[tokio::test]
    async fn huge_page_returns_empty_list() {
        let dir = TempDir::new().unwrap();
        let provider = FakeProvider::with(candidates(25));
        let (pipeline, fetcher) = pipeline(&dir, provider.clone());

        let results = pipeline.search("Biologia", Some(i64::MAX)).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.calls.lock()[0].1, usize::MAX);
    }

    #[tokio::test]
    async fn empty_term_never_reaches_provider() {
        let dir = TempDir::new().unwrap();
        let provider = FakeProvider::with(candidates(25));
        let (pipeline, _) = pipeline(&dir, provider.clone());

        assert_eq!(pipeline.search("   ", Some(1)).await, Err(ValidationError::EmptyTerm));
        assert!(provider.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn pages_slice_cumulative_results_in_order() {
        let dir = TempDir::new().unwrap();
        let provider = FakeProvider::with(candidates(25));
        let (pipeline, _) = pipeline(&dir, provider.clone());

        let first = pipeline.search("Biologia", Some(1)).await.unwrap();
        let second = pipeline.search("Biologia", Some(2)).await.unwrap();
        let third = pipeline.search("Biologia", Some(3)).await.unwrap();

        let titles = |page: &[ImageResult]| page.iter().map(|r| r.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&first), (0..10).map(|i| format!("Mapa {}", i)).collect::<Vec<_>>());
        assert_eq!(titles(&second), (10..20).map(|i| format!("Mapa {}", i)).collect::<Vec<_>>());
        assert_eq!(titles(&third), (20..25).map(|i| format!("Mapa {}", i)).collect::<Vec<_>>());

        assert_eq!(
            *provider.calls.lock(),
            vec![
                ("mapa mental Biologia".to_string(), 10),
                ("mapa mental Biologia".to_string(), 20),
                ("mapa mental Biologia".to_string(), 30),
            ]
        );

        assert_eq!(
            second[0].image,
            "/static/mapas_salvos/biologia/MAPA MENTAL SOBRE BIOLOGIA - 10.jpg"
        );
        assert_eq!(second[0].provenance, Provenance::LocalCache);
        assert_eq!(second[0].link, "https://site.example/10");
        assert_eq!(second[0].description_original, "Arquivo: MAPA MENTAL SOBRE BIOLOGIA");
    }

    #[tokio::test]
    async fn repeat_search_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let (pipeline, fetcher) = pipeline(&dir, FakeProvider::with(candidates(10)));

        let first = pipeline.search("Sistema Nervoso", None).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
        assert_eq!(
            first[0].image,
            "/static/mapas_salvos/sistema_nervoso/MAPA MENTAL SOBRE SISTEMA NERVOSO - 0.jpg"
        );

        let second = pipeline.search("Sistema Nervoso", None).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn failed_download_falls_back_to_remote_url() {
        let dir = TempDir::new().unwrap();
        let mut list = candidates(3);
        list[1].image = Some("https://img.example/broken.jpg".to_string());
        let (pipeline, _) = pipeline(&dir, FakeProvider::with(list));

        let results = pipeline.search("Biologia", None).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].provenance, Provenance::RemoteFallback);
        assert_eq!(results[1].image, "https://img.example/broken.jpg");
        assert_eq!(results[0].provenance, Provenance::LocalCache);
        assert_eq!(results[2].provenance, Provenance::LocalCache);
        assert_eq!(
            results[2].image,
            "/static/mapas_salvos/biologia/MAPA MENTAL SOBRE BIOLOGIA - 2.jpg"
        );
    }

    #[tokio::test]
    async fn candidates_without_image_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut list = candidates(10);
        list[2].image = None;
        list[7].image = Some(String::new());
        let (pipeline, _) = pipeline(&dir, FakeProvider::with(list));

        let results = pipeline.search("Biologia", None).await.unwrap();
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.title != "Mapa 2" && r.title != "Mapa 7"));
        // Indices follow provider positions, so a dropped candidate leaves a gap.
        assert_eq!(
            results[2].image,
            "/static/mapas_salvos/biologia/MAPA MENTAL SOBRE BIOLOGIA - 3.jpg"
        );
    }

    #[tokio::test]
    async fn missing_title_and_link_fall_back() {
        let dir = TempDir::new().unwrap();
        let list = vec![CandidateImage {
            title: None,
            image: Some("https://img.example/only.jpg".to_string()),
            url: None,
        }];
        let (pipeline, _) = pipeline(&dir, FakeProvider::with(list));

        let results = pipeline.search("Célula", None).await.unwrap();
        assert_eq!(results[0].title, "mapa mental Célula");
        assert_eq!(results[0].link, "https://img.example/only.jpg");
        assert_eq!(results[0].description_original, "Arquivo: MAPA MENTAL SOBRE CÉLULA");
        assert_eq!(
            results[0].image,
            "/static/mapas_salvos/celula/MAPA MENTAL SOBRE CELULA - 0.jpg"
        );
    }

    #[tokio::test]
    async fn provider_failure_yields_empty_page() {
        let dir = TempDir::new().unwrap();
        let (pipeline, fetcher) = pipeline(&dir, FakeProvider::failing());

        let results = pipeline.search("Biologia", Some(2)).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn page_beyond_results_is_empty() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _) = pipeline(&dir, FakeProvider::with(candidates(5)));

        assert!(pipeline.search("Biologia", Some(2)).await.unwrap().is_empty());
    }
}
