//! Weather forecast providers.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;
use tracing::warn;
use waypoint_db::models::{DailyForecast, DataSource, WeatherForecast};

use super::EnrichError;
use super::location::{country_code, title_case};

/// Days covered by a forecast.
pub const FORECAST_DAYS: u32 = 5;

/// Forecast capability. Implementations never fail: a broken upstream
/// yields a mock-tagged forecast instead.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn name(&self) -> &str;

    async fn forecast(&self, location: &str, days: u32) -> WeatherForecast;
}

const _: () = {
    fn _assert_object_safe(_: &dyn WeatherSource) {}
};

/// One-line planning hint derived from the first forecast day.
pub fn weather_advice(daily: &[DailyForecast]) -> String {
    let Some(first) = daily.first() else {
        return "Weather information not available.".to_owned();
    };

    let temp = (first.max_temp + first.min_temp) / 2.0;
    let desc = first.description.to_lowercase();
    let mut advice = Vec::new();

    if temp > 30.0 {
        advice.push("Hot weather expected - plan indoor activities during peak hours");
    } else if temp < 15.0 {
        advice.push("Cool weather - carry warm clothing");
    }

    if desc.contains("rain") {
        advice.push("Rain expected - carry umbrella and plan indoor alternatives");
    } else if desc.contains("clear") {
        advice.push("Clear skies - perfect for outdoor activities");
    }

    if advice.is_empty() {
        "Pleasant weather conditions expected".to_owned()
    } else {
        advice.join("; ")
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

const TEMP_VARIATION: [f64; 5] = [-2.0, 1.0, -1.0, 2.0, 0.0];
const MOCK_DESCRIPTIONS: [&str; 5] = [
    "clear sky",
    "partly cloudy",
    "overcast clouds",
    "light rain",
    "clear sky",
];

/// Deterministic offline forecasts, tagged [`DataSource::MockData`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MockWeather;

impl MockWeather {
    fn base_temp(location: &str) -> f64 {
        match location.trim().to_lowercase().as_str() {
            "jaipur" => 28.0,
            "hyderabad" => 26.0,
            "vizag" | "visakhapatnam" => 24.0,
            _ => 25.0,
        }
    }

    /// Forecast starting at `start`, one entry per day.
    pub fn forecast_from(location: &str, days: u32, start: NaiveDate) -> WeatherForecast {
        let base = Self::base_temp(location);
        let daily: Vec<DailyForecast> = (0..days as usize)
            .map(|i| {
                let variation = TEMP_VARIATION[i % TEMP_VARIATION.len()];
                DailyForecast {
                    date: start
                        .checked_add_days(Days::new(i as u64))
                        .unwrap_or(start),
                    max_temp: base + variation + 3.0,
                    min_temp: base + variation - 2.0,
                    description: MOCK_DESCRIPTIONS[i % MOCK_DESCRIPTIONS.len()].to_owned(),
                }
            })
            .collect();

        WeatherForecast {
            location: title_case(location),
            country: country_code(location).unwrap_or("IN").to_owned(),
            advice: weather_advice(&daily),
            daily_forecasts: daily,
            source: DataSource::MockData,
        }
    }

    pub fn forecast_for(location: &str, days: u32) -> WeatherForecast {
        Self::forecast_from(location, days, Utc::now().date_naive())
    }
}

#[async_trait]
impl WeatherSource for MockWeather {
    fn name(&self) -> &str {
        "mock"
    }

    async fn forecast(&self, location: &str, days: u32) -> WeatherForecast {
        Self::forecast_for(location, days)
    }
}

// ---------------------------------------------------------------------------
// OpenWeatherMap
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastItem>,
    city: City,
}

#[derive(Deserialize)]
struct ForecastItem {
    dt: i64,
    main: Main,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Deserialize)]
struct Main {
    temp: f64,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

#[derive(Deserialize)]
struct City {
    name: String,
    #[serde(default)]
    country: String,
    /// Offset from UTC in seconds.
    #[serde(default)]
    timezone: i64,
}

/// Live forecasts from the OpenWeatherMap 5-day/3-hour API.
pub struct OpenWeatherMap {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenWeatherMap {
    pub const ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/forecast";

    /// The API serves at most 40 three-hour slots.
    const MAX_SLOTS: u32 = 40;

    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, EnrichError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: Self::ENDPOINT.to_owned(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, location: &str, days: u32) -> Result<WeatherForecast, EnrichError> {
        let cnt = days.saturating_mul(8).min(Self::MAX_SLOTS).to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
                ("cnt", cnt.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Status(status.as_u16()));
        }

        let body: ForecastResponse = response.json().await?;
        let daily = aggregate_daily(&body.list, body.city.timezone, days as usize);
        if daily.is_empty() {
            return Err(EnrichError::Malformed("forecast contained no entries".into()));
        }

        Ok(WeatherForecast {
            location: body.city.name,
            country: body.city.country,
            advice: weather_advice(&daily),
            daily_forecasts: daily,
            source: DataSource::OpenWeatherMap,
        })
    }
}

/// Collapse 3-hourly slots into per-day max/min and most frequent
/// description, keyed by the city's local date.
fn aggregate_daily(items: &[ForecastItem], utc_offset_secs: i64, days: usize) -> Vec<DailyForecast> {
    let mut by_day: BTreeMap<NaiveDate, (Vec<f64>, Vec<&str>)> = BTreeMap::new();

    for item in items {
        let Some(ts) = DateTime::<Utc>::from_timestamp(item.dt.saturating_add(utc_offset_secs), 0)
        else {
            continue;
        };
        let entry = by_day.entry(ts.date_naive()).or_default();
        entry.0.push(item.main.temp);
        if let Some(cond) = item.weather.first() {
            entry.1.push(cond.description.as_str());
        }
    }

    by_day
        .into_iter()
        .take(days)
        .map(|(date, (temps, descriptions))| DailyForecast {
            date,
            max_temp: temps.iter().copied().fold(f64::MIN, f64::max),
            min_temp: temps.iter().copied().fold(f64::MAX, f64::min),
            description: most_frequent(&descriptions).unwrap_or_default().to_owned(),
        })
        .collect()
}

/// Most common entry; ties go to the one seen first.
fn most_frequent<'a>(values: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for (i, v) in values.iter().enumerate() {
        if values[..i].contains(v) {
            continue;
        }
        let count = values.iter().filter(|x| *x == v).count();
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((*v, count));
        }
    }
    best.map(|(v, _)| v)
}

#[async_trait]
impl WeatherSource for OpenWeatherMap {
    fn name(&self) -> &str {
        "openweathermap"
    }

    async fn forecast(&self, location: &str, days: u32) -> WeatherForecast {
        match self.fetch(location, days).await {
            Ok(forecast) => forecast,
            Err(e) => {
                warn!(provider = "openweathermap", location, error = %e, "forecast failed, using mock data");
                MockWeather::forecast_for(location, days)
            }
        }
    }
}
