//! Web search providers.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use waypoint_db::models::{DataSource, ResearchSnippet};

use super::EnrichError;

/// Search capability. Implementations never fail: a broken upstream yields
/// mock-tagged results instead.
#[async_trait]
pub trait Searcher: Send + Sync {
    fn name(&self) -> &str;

    /// At most `limit` results for `query`.
    async fn search(&self, query: &str, limit: usize) -> Vec<ResearchSnippet>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Searcher) {}
};

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Deterministic offline results, tagged [`DataSource::MockData`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSearcher;

impl MockSearcher {
    pub fn results(query: &str, limit: usize) -> Vec<ResearchSnippet> {
        let slug: String = query
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        vec![
            ResearchSnippet {
                title: format!("Search Results for: {query}"),
                snippet: format!(
                    "General information and resources related to {query}. \
                     Offline sample data; configure a search API key for live results."
                ),
                url: format!("https://example.com/search/{slug}"),
                source: DataSource::MockData,
            },
            ResearchSnippet {
                title: format!("Beginner's guide: {query}"),
                snippet: format!("Practical tips and common pitfalls for {query}."),
                url: format!("https://example.com/guide/{slug}"),
                source: DataSource::MockData,
            },
        ]
        .into_iter()
        .take(limit)
        .collect()
    }
}

#[async_trait]
impl Searcher for MockSearcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<ResearchSnippet> {
        Self::results(query, limit)
    }
}

// ---------------------------------------------------------------------------
// Google Custom Search
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

/// Live searcher backed by the Google Custom Search JSON API.
pub struct GoogleSearcher {
    http: reqwest::Client,
    api_key: String,
    engine_id: String,
    endpoint: String,
}

impl GoogleSearcher {
    pub const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

    /// The API returns at most this many items per request.
    const MAX_NUM: usize = 10;

    pub fn new(
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EnrichError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            endpoint: Self::ENDPOINT.to_owned(),
        })
    }

    /// Point the client at a different endpoint (self-hosted proxy, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<ResearchSnippet>, EnrichError> {
        let num = limit.clamp(1, Self::MAX_NUM).to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Status(status.as_u16()));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .take(limit)
            .map(|item| ResearchSnippet {
                title: item.title,
                snippet: item.snippet,
                url: item.link,
                source: DataSource::GoogleSearch,
            })
            .collect())
    }
}

#[async_trait]
impl Searcher for GoogleSearcher {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<ResearchSnippet> {
        match self.fetch(query, limit).await {
            Ok(results) => results,
            Err(e) => {
                warn!(provider = "google", query, error = %e, "search failed, using mock results");
                MockSearcher::results(query, limit)
            }
        }
    }
}
