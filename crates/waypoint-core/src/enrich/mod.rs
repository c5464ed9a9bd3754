//! Step enrichment: web research and weather for steps that ask for it.
//!
//! Providers sit behind the [`Searcher`] and [`WeatherSource`] traits with a
//! live and a mock implementation each, chosen once at startup. Live
//! providers absorb their own failures, so enrichment never fails.

pub mod cache;
pub mod location;
pub mod search;
pub mod weather;

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::debug;
use waypoint_db::models::{PlanStep, ResearchSnippet, WeatherForecast};

pub use cache::EnrichmentCache;
pub use location::{DetectedLocation, detect_location};
pub use search::{GoogleSearcher, MockSearcher, Searcher};
pub use weather::{FORECAST_DAYS, MockWeather, OpenWeatherMap, WeatherSource};

/// Results kept per research topic.
pub const RESULTS_PER_TOPIC: usize = 3;

/// Results kept per step across all of its topics.
pub const RESULTS_PER_STEP: usize = 6;

/// Failures inside a live provider. Converted to mock data before leaving it.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Attaches research and weather data to plan steps.
#[derive(Clone)]
pub struct Enricher {
    searcher: Arc<dyn Searcher>,
    weather: Arc<dyn WeatherSource>,
    cache: EnrichmentCache,
}

impl Enricher {
    pub fn new(
        searcher: Arc<dyn Searcher>,
        weather: Arc<dyn WeatherSource>,
        cache: EnrichmentCache,
    ) -> Self {
        Self {
            searcher,
            weather,
            cache,
        }
    }

    /// Mock providers and no cache. Fully offline and deterministic.
    pub fn offline() -> Self {
        Self::new(
            Arc::new(MockSearcher),
            Arc::new(MockWeather),
            EnrichmentCache::disabled(),
        )
    }

    pub fn searcher_name(&self) -> &str {
        self.searcher.name()
    }

    pub fn weather_name(&self) -> &str {
        self.weather.name()
    }

    /// Enrich every step that requires research. Steps are processed
    /// concurrently and returned in their original order.
    ///
    /// The location is detected once from `goal`; when found, each research
    /// step also receives the forecast for it.
    pub async fn enrich(&self, goal: &str, steps: Vec<PlanStep>) -> Vec<PlanStep> {
        let location = detect_location(goal);
        let needs_research = steps.iter().any(|s| s.requires_research);

        let forecast = match (&location, needs_research) {
            (Some(loc), true) => Some(self.forecast(&loc.name).await),
            _ => None,
        };
        if let Some(loc) = &location {
            debug!(location = %loc.name, source = ?loc.source, "location detected");
        }

        let location_name = location.as_ref().map(|l| l.name.as_str());
        join_all(
            steps
                .into_iter()
                .map(|step| self.enrich_step(step, location_name, forecast.as_ref())),
        )
        .await
    }

    async fn enrich_step(
        &self,
        mut step: PlanStep,
        location: Option<&str>,
        forecast: Option<&WeatherForecast>,
    ) -> PlanStep {
        if !step.requires_research {
            return step;
        }

        let topics: Vec<&str> = if step.research_topics.is_empty() {
            vec![step.title.as_str()]
        } else {
            step.research_topics.iter().map(String::as_str).collect()
        };

        let per_topic = join_all(topics.iter().map(|t| self.search(t))).await;
        let research: Vec<ResearchSnippet> = per_topic
            .into_iter()
            .flat_map(|hits| hits.into_iter().take(RESULTS_PER_TOPIC))
            .take(RESULTS_PER_STEP)
            .collect();
        step.web_research = Some(research);

        if let (Some(name), Some(forecast)) = (location, forecast) {
            step.weather_info = Some(forecast.clone());
            step.detected_location = Some(name.to_owned());
        }
        step
    }

    /// Cached search. Fallback results are cached too, so a failing
    /// provider is not called again for the same query until the entry
    /// expires.
    async fn search(&self, query: &str) -> Vec<ResearchSnippet> {
        if let Some(hit) = self.cache.get_search(query) {
            debug!(query, "search cache hit");
            return hit;
        }

        let results = self.searcher.search(query, RESULTS_PER_TOPIC).await;
        self.cache.put_search(query, results.clone());
        results
    }

    /// Cached forecast, including fallback forecasts.
    async fn forecast(&self, location: &str) -> WeatherForecast {
        if let Some(hit) = self.cache.get_weather(location) {
            debug!(location, "weather cache hit");
            return hit;
        }

        let forecast = self.weather.forecast(location, FORECAST_DAYS).await;
        self.cache.put_weather(location, forecast.clone());
        forecast
    }
}
