pub mod duckduckgo;

pub use duckduckgo::DuckDuckGoImages;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::search::CandidateImage;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Rate limited or blocked")]
    RateLimited,

    #[error("Search token not found for query: {0}")]
    TokenNotFound(String),
}

/// External image search. Has no offset parameter: callers ask for a cumulative
/// `max_results` bound and slice the page they need out of the ordered list.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn images(&self, query: &str, max_results: usize) -> Result<Vec<CandidateImage>, ProviderError>;
}

