// Catalog cache abstraction with a TTL read from an injected clock

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::registry::TokenCatalog;
use crate::domain::Clock;

pub const DEFAULT_TTL_SECS: i64 = 300;

/// Cache key: one catalog per (role, collection, locale)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub role: String,
    pub collection_id: Option<String>,
    pub locale: Option<String>,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.role,
            self.collection_id.as_deref().unwrap_or("-"),
            self.locale.as_deref().unwrap_or("-")
        )
    }
}

pub trait TokenCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<TokenCatalog>>;
    fn set(&self, key: CacheKey, catalog: Arc<TokenCatalog>);
    fn clear(&self);
    fn ttl(&self) -> Duration;
}

struct CachedCatalog {
    catalog: Arc<TokenCatalog>,
    inserted_at: DateTime<Utc>,
}

/// Map-backed cache. Concurrent rebuilds of one key are allowed; the last
/// write wins.
pub struct InMemoryTokenCache {
    entries: RwLock<HashMap<CacheKey, CachedCatalog>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl InMemoryTokenCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, cached: &CachedCatalog, now: DateTime<Utc>) -> bool {
        now - cached.inserted_at >= self.ttl
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<TokenCatalog>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().ok()?;
            let cached = entries.get(key)?;
            if !self.is_expired(cached, now) {
                return Some(Arc::clone(&cached.catalog));
            }
        }

        // Expired: evict so stale keys do not pile up
        if let Ok(mut entries) = self.entries.write() {
            if entries.get(key).is_some_and(|cached| self.is_expired(cached, now)) {
                entries.remove(key);
            }
        }
        None
    }

    fn set(&self, key: CacheKey, catalog: Arc<TokenCatalog>) {
        let inserted_at = self.clock.now();
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, cached| !self.is_expired(cached, inserted_at));
            entries.insert(key, CachedCatalog { catalog, inserted_at });
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FixedClock;
    use chrono::TimeZone;

    fn key(role: &str) -> CacheKey {
        CacheKey {
            role: role.to_string(),
            collection_id: Some("posts".to_string()),
            locale: None,
        }
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache = InMemoryTokenCache::new(clock.clone());
        cache.set(key("editor"), Arc::new(TokenCatalog::default()));

        assert!(cache.get(&key("editor")).is_some());
        assert!(cache.get(&key("viewer")).is_none());

        clock.advance(Duration::seconds(299));
        assert!(cache.get(&key("editor")).is_some());

        clock.advance(Duration::seconds(1));
        assert!(cache.get(&key("editor")).is_none());
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache = InMemoryTokenCache::new(clock.clone());
        for locale in 0..100 {
            let key = CacheKey {
                locale: Some(format!("x{}", locale)),
                ..key("editor")
            };
            cache.set(key, Arc::new(TokenCatalog::default()));
        }
        assert_eq!(cache.len(), 100);

        clock.advance(Duration::days(1));
        cache.set(key("viewer"), Arc::new(TokenCatalog::default()));
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::days(1));
        assert!(cache.get(&key("viewer")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = InMemoryTokenCache::new(clock);
        cache.set(key("editor"), Arc::new(TokenCatalog::default()));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&key("editor")).is_none());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key("editor").to_string(), "editor:posts:-");
    }
}
