pub mod naming;
pub mod store;
pub mod vqd;

pub use naming::{sanitize, CacheKey};
pub use store::{CacheError, CacheStore};
pub use vqd::TokenCache;
