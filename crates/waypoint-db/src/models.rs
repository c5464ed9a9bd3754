use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which generator produced a plan's steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    /// Steps came from a chat-completion call.
    Openai,
    /// Steps came from the deterministic template generator.
    Fallback,
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Openai => "openai",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

impl FromStr for AiProvider {
    type Err = AiProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::Openai),
            "fallback" => Ok(Self::Fallback),
            other => Err(AiProviderParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AiProvider`] string.
#[derive(Debug, Clone)]
pub struct AiProviderParseError(pub String);

impl fmt::Display for AiProviderParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ai provider: {:?}", self.0)
    }
}

impl std::error::Error for AiProviderParseError {}

// ---------------------------------------------------------------------------

/// Origin tag attached to every piece of enrichment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    GoogleSearch,
    #[serde(rename = "openweathermap")]
    OpenWeatherMap,
    /// Static substitute data used when a live lookup is unavailable.
    MockData,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GoogleSearch => "google_search",
            Self::OpenWeatherMap => "openweathermap",
            Self::MockData => "mock_data",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Enrichment payloads
// ---------------------------------------------------------------------------

/// One web-search hit attached to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSnippet {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: DataSource,
}

/// Summary of one forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub max_temp: f64,
    pub min_temp: f64,
    pub description: String,
}

/// Multi-day forecast for the location a plan is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub location: String,
    pub country: String,
    /// Ordered by date, earliest first.
    pub daily_forecasts: Vec<DailyForecast>,
    /// Short planning hint derived from the first forecast day.
    pub advice: String,
    pub source: DataSource,
}

// ---------------------------------------------------------------------------
// Plans and steps
// ---------------------------------------------------------------------------

/// One actionable unit within a plan.
///
/// `web_research` is populated exactly when `requires_research` is true.
/// `weather_info` and `detected_location` are populated when the step
/// required research and a location was detected in the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based, matches the step's position in the plan.
    pub step_number: i64,
    pub title: String,
    pub description: String,
    /// Free text, e.g. "2 hours".
    pub estimated_duration: String,
    pub requires_research: bool,
    #[serde(default)]
    pub research_topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_research: Option<Vec<ResearchSnippet>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_info: Option<WeatherForecast>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_location: Option<String>,
}

/// Aggregate flags derived from a plan's steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub has_weather_info: bool,
    pub has_web_research: bool,
    /// Sorted, de-duplicated union of every step's research topics.
    pub research_topics: Vec<String>,
    pub ai_provider: AiProvider,
}

impl PlanMetadata {
    /// Derive metadata from a finished step list.
    pub fn from_steps(steps: &[PlanStep], ai_provider: AiProvider) -> Self {
        let topics: BTreeSet<&str> = steps
            .iter()
            .flat_map(|s| s.research_topics.iter().map(String::as_str))
            .collect();
        Self {
            has_weather_info: steps.iter().any(|s| s.weather_info.is_some()),
            has_web_research: steps.iter().any(|s| s.web_research.is_some()),
            research_topics: topics.into_iter().map(str::to_owned).collect(),
            ai_provider,
        }
    }
}

/// A generated plan that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlan {
    pub goal: String,
    pub estimated_total_duration: String,
    pub steps: Vec<PlanStep>,
    pub ai_provider: AiProvider,
}

/// A stored plan with all of its steps. This is the canonical JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub total_steps: i64,
    pub estimated_total_duration: String,
    pub metadata: PlanMetadata,
    pub steps: Vec<PlanStep>,
}

/// A row of the plan listing: everything except the steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlanSummary {
    pub id: Uuid,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub total_steps: i64,
    pub estimated_total_duration: String,
    pub has_weather_info: bool,
    pub has_web_research: bool,
    pub ai_provider: AiProvider,
}

/// One page of a plan listing.
#[derive(Debug, Clone, Serialize)]
pub struct PlanPage {
    pub items: Vec<PlanSummary>,
    /// Number of plans matching the search across all pages.
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Aggregate numbers over the whole store.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStats {
    pub total_plans: i64,
    pub total_steps: i64,
    /// Plans created in the last seven days.
    pub recent_plans: i64,
    pub average_steps_per_plan: f64,
    pub database_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: i64, topics: &[&str], research: bool) -> PlanStep {
        PlanStep {
            step_number: n,
            title: format!("Step {n}"),
            description: "do it".to_string(),
            estimated_duration: "1 hour".to_string(),
            requires_research: research,
            research_topics: topics.iter().map(|t| t.to_string()).collect(),
            web_research: research.then(Vec::new),
            weather_info: None,
            detected_location: None,
        }
    }

    #[test]
    fn ai_provider_roundtrip() {
        for p in [AiProvider::Openai, AiProvider::Fallback] {
            assert_eq!(p.to_string().parse::<AiProvider>().unwrap(), p);
        }
        assert!("gpt".parse::<AiProvider>().is_err());
    }

    #[test]
    fn data_source_serializes_as_tag() {
        assert_eq!(
            serde_json::to_string(&DataSource::MockData).unwrap(),
            "\"mock_data\""
        );
        assert_eq!(
            serde_json::to_string(&DataSource::OpenWeatherMap).unwrap(),
            "\"openweathermap\""
        );
    }

    #[test]
    fn metadata_from_steps() {
        let steps = vec![
            step(1, &["tokyo food", "tokyo temples"], true),
            step(2, &["tokyo food"], false),
        ];
        let meta = PlanMetadata::from_steps(&steps, AiProvider::Fallback);
        assert!(meta.has_web_research);
        assert!(!meta.has_weather_info);
        assert_eq!(meta.research_topics, vec!["tokyo food", "tokyo temples"]);
        assert_eq!(meta.ai_provider, AiProvider::Fallback);
    }

    #[test]
    fn unenriched_step_omits_optional_fields() {
        let json = serde_json::to_value(step(1, &[], false)).unwrap();
        assert!(json.get("web_research").is_none());
        assert!(json.get("weather_info").is_none());
        assert_eq!(json["step_number"], 1);
    }
}
