//! TTL cache for enrichment lookups.
//!
//! Keys are the exact query or location string. Concurrent misses on the
//! same key may both call upstream and both insert; the last write wins.

use std::time::Duration;

use moka::sync::Cache;
use waypoint_db::models::{ResearchSnippet, WeatherForecast};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

const MAX_ENTRIES: u64 = 1_000;

#[derive(Debug, Clone)]
struct Caches {
    search: Cache<String, Vec<ResearchSnippet>>,
    weather: Cache<String, WeatherForecast>,
}

/// Owned cache handle injected into the enricher. Cloning shares storage.
#[derive(Debug, Clone)]
pub struct EnrichmentCache {
    inner: Option<Caches>,
}

impl EnrichmentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Some(Caches {
                search: Cache::builder()
                    .max_capacity(MAX_ENTRIES)
                    .time_to_live(ttl)
                    .build(),
                weather: Cache::builder()
                    .max_capacity(MAX_ENTRIES)
                    .time_to_live(ttl)
                    .build(),
            }),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn get_search(&self, query: &str) -> Option<Vec<ResearchSnippet>> {
        self.inner.as_ref()?.search.get(query)
    }

    pub fn put_search(&self, query: &str, results: Vec<ResearchSnippet>) {
        if let Some(c) = &self.inner {
            c.search.insert(query.to_owned(), results);
        }
    }

    pub fn get_weather(&self, location: &str) -> Option<WeatherForecast> {
        self.inner.as_ref()?.weather.get(location)
    }

    pub fn put_weather(&self, location: &str, forecast: WeatherForecast) {
        if let Some(c) = &self.inner {
            c.weather.insert(location.to_owned(), forecast);
        }
    }
}

impl Default for EnrichmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use waypoint_db::models::DataSource;

    use super::*;

    fn snippet(title: &str) -> ResearchSnippet {
        ResearchSnippet {
            title: title.to_string(),
            snippet: String::new(),
            url: "https://example.com".to_string(),
            source: DataSource::GoogleSearch,
        }
    }

    #[test]
    fn stores_and_returns_by_exact_key() {
        let cache = EnrichmentCache::new(Duration::from_secs(60));
        cache.put_search("tokyo food", vec![snippet("a")]);
        assert_eq!(cache.get_search("tokyo food").unwrap()[0].title, "a");
        assert!(cache.get_search("Tokyo food").is_none());
    }

    #[test]
    fn entries_expire() {
        let cache = EnrichmentCache::new(Duration::from_millis(50));
        cache.put_search("q", vec![snippet("a")]);
        std::thread::sleep(Duration::from_millis(120));
        assert!(cache.get_search("q").is_none());
    }

    #[test]
    fn disabled_cache_is_a_no_op() {
        let cache = EnrichmentCache::disabled();
        assert!(!cache.is_enabled());
        cache.put_search("q", vec![snippet("a")]);
        assert!(cache.get_search("q").is_none());
    }
}
