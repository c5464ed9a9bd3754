//! Integration tests for step enrichment: mock providers, live-provider
//! failure, result limits, and caching.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use waypoint_core::enrich::{
    EnrichmentCache, Enricher, GoogleSearcher, MockSearcher, MockWeather, OpenWeatherMap,
    RESULTS_PER_STEP, RESULTS_PER_TOPIC, Searcher, WeatherSource,
};
use waypoint_core::planner::fallback_steps;
use waypoint_db::models::{DataSource, PlanStep, ResearchSnippet, WeatherForecast};

/// Returns `per_query` results tagged with `source` and counts calls.
struct CountingSearcher {
    source: DataSource,
    per_query: usize,
    calls: AtomicUsize,
}

impl CountingSearcher {
    fn new(source: DataSource, per_query: usize) -> Arc<Self> {
        Arc::new(Self {
            source,
            per_query,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Searcher for CountingSearcher {
    fn name(&self) -> &str {
        "counting"
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<ResearchSnippet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (0..self.per_query.min(limit))
            .map(|i| ResearchSnippet {
                title: format!("{query} #{i}"),
                snippet: String::new(),
                url: format!("https://example.com/{i}"),
                source: self.source,
            })
            .collect()
    }
}

/// Live-tagged forecast that counts calls.
struct CountingWeather {
    calls: AtomicUsize,
}

#[async_trait]
impl WeatherSource for CountingWeather {
    fn name(&self) -> &str {
        "counting"
    }

    async fn forecast(&self, location: &str, days: u32) -> WeatherForecast {
        self.calls.fetch_add(1, Ordering::SeqCst);
        WeatherForecast {
            source: DataSource::OpenWeatherMap,
            ..MockWeather::forecast_for(location, days)
        }
    }
}

fn research_step(n: i64, title: &str, topics: &[&str]) -> PlanStep {
    PlanStep {
        step_number: n,
        title: title.to_string(),
        description: "d".to_string(),
        estimated_duration: "1 hour".to_string(),
        requires_research: true,
        research_topics: topics.iter().map(|t| t.to_string()).collect(),
        web_research: None,
        weather_info: None,
        detected_location: None,
    }
}

const TOKYO_GOAL: &str = "Plan a 3-day trip to Tokyo with cultural sites and food";

#[tokio::test]
async fn offline_enrichment_populates_research_steps_only() {
    let steps = Enricher::offline()
        .enrich(TOKYO_GOAL, fallback_steps(TOKYO_GOAL))
        .await;

    assert_eq!(steps.len(), 4);
    for step in &steps {
        if step.requires_research {
            let research = step.web_research.as_ref().expect("research step enriched");
            assert!(!research.is_empty());
            assert!(research.iter().all(|r| r.source == DataSource::MockData));

            let weather = step.weather_info.as_ref().expect("location detected");
            assert_eq!(weather.location, "Tokyo");
            assert_eq!(weather.source, DataSource::MockData);
            assert_eq!(weather.daily_forecasts.len(), 5);
            assert_eq!(step.detected_location.as_deref(), Some("Tokyo"));
        } else {
            assert!(step.web_research.is_none());
            assert!(step.weather_info.is_none());
            assert!(step.detected_location.is_none());
        }
    }
    let numbers: Vec<i64> = steps.iter().map(|s| s.step_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn no_location_means_no_weather() {
    let goal = "learn python in 30 days";
    let steps = Enricher::offline().enrich(goal, fallback_steps(goal)).await;
    assert!(steps[0].web_research.is_some());
    assert!(steps.iter().all(|s| s.weather_info.is_none()));
}

#[tokio::test]
async fn failing_live_providers_match_mock_shape() {
    let dead = Duration::from_secs(2);
    let live = Enricher::new(
        Arc::new(
            GoogleSearcher::new("key", "cx", dead)
                .unwrap()
                .with_endpoint("http://127.0.0.1:9/customsearch/v1"),
        ),
        Arc::new(
            OpenWeatherMap::new("key", dead)
                .unwrap()
                .with_endpoint("http://127.0.0.1:9/forecast"),
        ),
        EnrichmentCache::default(),
    );
    let mock = Enricher::offline();

    let from_live = live.enrich(TOKYO_GOAL, fallback_steps(TOKYO_GOAL)).await;
    let from_mock = mock.enrich(TOKYO_GOAL, fallback_steps(TOKYO_GOAL)).await;

    // Mock dates depend on the clock, everything else is identical.
    assert_eq!(from_live.len(), from_mock.len());
    for (a, b) in from_live.iter().zip(&from_mock) {
        assert_eq!(a.web_research, b.web_research);
        assert_eq!(a.detected_location, b.detected_location);
        assert_eq!(
            a.weather_info.as_ref().map(|w| (&w.location, w.source, w.daily_forecasts.len())),
            b.weather_info.as_ref().map(|w| (&w.location, w.source, w.daily_forecasts.len())),
        );
    }
}

#[tokio::test]
async fn results_are_capped_per_topic_and_step() {
    let searcher = CountingSearcher::new(DataSource::GoogleSearch, 10);
    let enricher = Enricher::new(
        searcher.clone(),
        Arc::new(MockWeather),
        EnrichmentCache::disabled(),
    );

    let steps = vec![
        research_step(1, "One topic", &["alpha"]),
        research_step(2, "Three topics", &["alpha", "beta", "gamma"]),
        research_step(3, "No topics", &[]),
    ];
    let out = enricher.enrich("learn something", steps).await;

    assert_eq!(out[0].web_research.as_ref().unwrap().len(), RESULTS_PER_TOPIC);
    let second = out[1].web_research.as_ref().unwrap();
    assert_eq!(second.len(), RESULTS_PER_STEP);
    assert!(second[0].title.starts_with("alpha"));
    assert!(second[3].title.starts_with("beta"));
    // Falls back to the title as the query.
    assert!(out[2].web_research.as_ref().unwrap()[0].title.starts_with("No topics"));
    assert_eq!(searcher.calls(), 5);
}

#[tokio::test]
async fn live_results_are_cached() {
    let searcher = CountingSearcher::new(DataSource::GoogleSearch, 2);
    let weather = Arc::new(CountingWeather {
        calls: AtomicUsize::new(0),
    });
    let enricher = Enricher::new(
        searcher.clone(),
        weather.clone(),
        EnrichmentCache::new(Duration::from_secs(60)),
    );

    let steps = || vec![research_step(1, "Food", &["tokyo food"])];
    let first = enricher.enrich(TOKYO_GOAL, steps()).await;
    let second = enricher.enrich(TOKYO_GOAL, steps()).await;

    assert_eq!(first, second);
    assert_eq!(searcher.calls(), 1);
    assert_eq!(weather.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fallback_results_are_cached_per_key() {
    // A live searcher whose upstream is down hands back mock-tagged data.
    let searcher = CountingSearcher::new(DataSource::MockData, 2);
    let enricher = Enricher::new(
        searcher.clone(),
        Arc::new(MockWeather),
        EnrichmentCache::new(Duration::from_secs(3600)),
    );

    for _ in 0..3 {
        enricher
            .enrich("learn", vec![research_step(1, "Food", &["tokyo food"])])
            .await;
    }
    assert_eq!(searcher.calls(), 1);

    enricher
        .enrich("learn", vec![research_step(1, "Sights", &["tokyo temples"])])
        .await;
    assert_eq!(searcher.calls(), 2);
}

#[tokio::test]
async fn disabled_cache_calls_upstream_every_time() {
    let searcher = CountingSearcher::new(DataSource::GoogleSearch, 2);
    let enricher = Enricher::new(
        searcher.clone(),
        Arc::new(MockWeather),
        EnrichmentCache::disabled(),
    );

    for _ in 0..2 {
        enricher
            .enrich("learn", vec![research_step(1, "Food", &["tokyo food"])])
            .await;
    }
    assert_eq!(searcher.calls(), 2);
}

#[tokio::test]
async fn mock_searcher_output_is_stable() {
    let a = MockSearcher.search("tokyo food", RESULTS_PER_TOPIC).await;
    let b = MockSearcher.search("tokyo food", RESULTS_PER_TOPIC).await;
    assert_eq!(a, b);
}
