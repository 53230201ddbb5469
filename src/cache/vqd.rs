use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub expires_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Search tokens handed out by the provider, one per query string.
///
/// Paging through the same term reuses the token instead of asking for a new one.
pub struct TokenCache {
    tokens: RwLock<HashMap<String, CacheEntry<String>>>,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, query: &str) -> Option<String> {
        let tokens = self.tokens.read();
        tokens
            .get(query)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.data.clone())
    }

    pub fn store(&self, query: &str, token: String) {
        let mut tokens = self.tokens.write();
        tokens.retain(|_, entry| !entry.is_expired());
        tokens.insert(query.to_string(), CacheEntry::new(token, self.ttl));
    }

    pub fn invalidate(&self, query: &str) {
        self.tokens.write().remove(query);
    }
}
