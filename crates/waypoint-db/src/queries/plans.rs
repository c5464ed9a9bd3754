//! Database query functions for the `plans` and `plan_steps` tables.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{
    AiProvider, NewPlan, Plan, PlanMetadata, PlanPage, PlanStats, PlanStep, PlanSummary,
    ResearchSnippet, WeatherForecast,
};

/// Largest page a listing will return.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Listing parameters: optional goal search plus offset pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanQuery {
    /// Case-insensitive substring matched against the goal text.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
}

impl Default for PlanQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PlanQuery {
    /// Clamp `page` to at least 1 and `page_size` to `1..=MAX_PAGE_SIZE`, and
    /// drop a blank search string.
    pub fn clamped(&self) -> Self {
        Self {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(FromRow)]
struct PlanRow {
    id: Uuid,
    goal: String,
    created_at: DateTime<Utc>,
    total_steps: i64,
    estimated_total_duration: String,
    has_weather_info: bool,
    has_web_research: bool,
    research_topics: Json<Vec<String>>,
    ai_provider: AiProvider,
}

#[derive(FromRow)]
struct StepRow {
    step_number: i64,
    title: String,
    description: String,
    estimated_duration: String,
    requires_research: bool,
    research_topics: Json<Vec<String>>,
    web_research: Option<Json<Vec<ResearchSnippet>>>,
    weather_info: Option<Json<WeatherForecast>>,
    detected_location: Option<String>,
}

impl From<StepRow> for PlanStep {
    fn from(row: StepRow) -> Self {
        Self {
            step_number: row.step_number,
            title: row.title,
            description: row.description,
            estimated_duration: row.estimated_duration,
            requires_research: row.requires_research,
            research_topics: row.research_topics.0,
            web_research: row.web_research.map(|j| j.0),
            weather_info: row.weather_info.map(|j| j.0),
            detected_location: row.detected_location,
        }
    }
}

impl PlanRow {
    fn into_plan(self, steps: Vec<PlanStep>) -> Plan {
        Plan {
            id: self.id,
            goal: self.goal,
            created_at: self.created_at,
            total_steps: self.total_steps,
            estimated_total_duration: self.estimated_total_duration,
            metadata: PlanMetadata {
                has_weather_info: self.has_weather_info,
                has_web_research: self.has_web_research,
                research_topics: self.research_topics.0,
                ai_provider: self.ai_provider,
            },
            steps,
        }
    }
}

/// Insert a plan and all of its steps inside a single transaction.
///
/// Steps are stored in the order given and renumbered `1..=N` by position.
/// Returns the stored plan with its generated id and creation time.
pub async fn save_plan(pool: &SqlitePool, new_plan: &NewPlan) -> Result<Plan> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    let steps: Vec<PlanStep> = new_plan
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| PlanStep {
            step_number: i as i64 + 1,
            ..s.clone()
        })
        .collect();
    let metadata = PlanMetadata::from_steps(&steps, new_plan.ai_provider);
    let total_steps = steps.len() as i64;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query(
        "INSERT INTO plans (id, goal, goal_search, created_at, total_steps, \
         estimated_total_duration, has_weather_info, has_web_research, research_topics, \
         ai_provider) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&new_plan.goal)
    .bind(new_plan.goal.to_lowercase())
    .bind(created_at)
    .bind(total_steps)
    .bind(&new_plan.estimated_total_duration)
    .bind(metadata.has_weather_info)
    .bind(metadata.has_web_research)
    .bind(Json(&metadata.research_topics))
    .bind(metadata.ai_provider)
    .execute(&mut *tx)
    .await
    .context("failed to insert plan")?;

    for step in &steps {
        sqlx::query(
            "INSERT INTO plan_steps (plan_id, step_number, title, description, \
             estimated_duration, requires_research, research_topics, web_research, \
             weather_info, detected_location) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(step.step_number)
        .bind(&step.title)
        .bind(&step.description)
        .bind(&step.estimated_duration)
        .bind(step.requires_research)
        .bind(Json(&step.research_topics))
        .bind(step.web_research.as_ref().map(Json))
        .bind(step.weather_info.as_ref().map(Json))
        .bind(&step.detected_location)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert step {}", step.step_number))?;
    }

    tx.commit().await.context("failed to commit transaction")?;

    tracing::info!(plan_id = %id, steps = total_steps, "plan saved");

    Ok(Plan {
        id,
        goal: new_plan.goal.clone(),
        created_at,
        total_steps,
        estimated_total_duration: new_plan.estimated_total_duration.clone(),
        metadata,
        steps,
    })
}

/// Fetch a plan and its steps by ID. Returns `None` if no such plan exists.
pub async fn get_plan(pool: &SqlitePool, id: Uuid) -> Result<Option<Plan>> {
    let row = sqlx::query_as::<_, PlanRow>("SELECT * FROM plans WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let steps = sqlx::query_as::<_, StepRow>(
        "SELECT step_number, title, description, estimated_duration, requires_research, \
         research_topics, web_research, weather_info, detected_location \
         FROM plan_steps WHERE plan_id = ? ORDER BY step_number",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("failed to fetch plan steps")?;

    Ok(Some(
        row.into_plan(steps.into_iter().map(PlanStep::from).collect()),
    ))
}

/// Escape `LIKE` wildcards so the search text is matched literally.
///
/// The pattern is lowercased the same way `goal_search` is filled, so
/// non-ASCII letters compare case-insensitively too.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// List plans newest first, optionally filtered by a case-insensitive goal
/// search, one page at a time.
///
/// `total_count` is the number of matching plans across all pages.
pub async fn list_plans(pool: &SqlitePool, query: &PlanQuery) -> Result<PlanPage> {
    let query = query.clamped();
    let pattern = query.search.as_deref().map(like_pattern);

    let (items, total_count) = match &pattern {
        Some(pattern) => {
            let items = sqlx::query_as::<_, PlanSummary>(
                "SELECT id, goal, created_at, total_steps, estimated_total_duration, \
                 has_weather_info, has_web_research, ai_provider \
                 FROM plans WHERE goal_search LIKE ? ESCAPE '\\' \
                 ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            )
            .bind(pattern)
            .bind(query.page_size)
            .bind(query.offset())
            .fetch_all(pool)
            .await
            .context("failed to search plans")?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM plans WHERE goal_search LIKE ? ESCAPE '\\'",
            )
            .bind(pattern)
            .fetch_one(pool)
            .await
            .context("failed to count matching plans")?;

            (items, total)
        }
        None => {
            let items = sqlx::query_as::<_, PlanSummary>(
                "SELECT id, goal, created_at, total_steps, estimated_total_duration, \
                 has_weather_info, has_web_research, ai_provider \
                 FROM plans ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            )
            .bind(query.page_size)
            .bind(query.offset())
            .fetch_all(pool)
            .await
            .context("failed to list plans")?;

            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
                .fetch_one(pool)
                .await
                .context("failed to count plans")?;

            (items, total)
        }
    };

    Ok(PlanPage {
        items,
        total_count,
        page: query.page,
        page_size: query.page_size,
    })
}

/// Like [`list_plans`], but loads every plan on the page with its steps.
pub async fn list_full_plans(pool: &SqlitePool, query: &PlanQuery) -> Result<Vec<Plan>> {
    let page = list_plans(pool, query).await?;
    let mut out = Vec::with_capacity(page.items.len());
    for summary in &page.items {
        // A concurrent delete between the two reads just drops the plan.
        if let Some(plan) = get_plan(pool, summary.id).await? {
            out.push(plan);
        }
    }
    Ok(out)
}

/// Delete a plan and all of its steps atomically.
///
/// Returns `false` if no plan with that ID exists.
pub async fn delete_plan(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let steps = sqlx::query("DELETE FROM plan_steps WHERE plan_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to delete plan steps")?;

    let plan = sqlx::query("DELETE FROM plans WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to delete plan")?;

    if plan.rows_affected() == 0 {
        // Nothing to delete; the transaction rolls back on drop.
        tracing::warn!(plan_id = %id, "plan not found for deletion");
        return Ok(false);
    }

    tx.commit().await.context("failed to commit transaction")?;

    tracing::info!(
        plan_id = %id,
        steps = steps.rows_affected(),
        "plan deleted"
    );
    Ok(true)
}

/// Compute aggregate statistics over the store.
///
/// `database_url` is echoed back as given; callers pass a display-safe URL.
pub async fn plan_stats(pool: &SqlitePool, database_url: &str) -> Result<PlanStats> {
    let total_plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
        .fetch_one(pool)
        .await
        .context("failed to count plans")?;

    let total_steps: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plan_steps")
        .fetch_one(pool)
        .await
        .context("failed to count steps")?;

    let week_ago = Utc::now() - Duration::days(7);
    let recent_plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans WHERE created_at >= ?")
        .bind(week_ago)
        .fetch_one(pool)
        .await
        .context("failed to count recent plans")?;

    let average: Option<f64> = sqlx::query_scalar("SELECT AVG(total_steps) FROM plans")
        .fetch_one(pool)
        .await
        .context("failed to average plan steps")?;

    Ok(PlanStats {
        total_plans,
        total_steps,
        recent_plans,
        average_steps_per_plan: (average.unwrap_or(0.0) * 100.0).round() / 100.0,
        database_url: database_url.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_pagination() {
        let q = PlanQuery {
            search: Some("   ".to_string()),
            page: 0,
            page_size: 1000,
        }
        .clamped();
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, MAX_PAGE_SIZE);
        assert_eq!(q.search, None);

        let q = PlanQuery {
            search: Some(" Tokyo ".to_string()),
            page: 3,
            page_size: 0,
        }
        .clamped();
        assert_eq!(q.page_size, 1);
        assert_eq!(q.offset(), 2);
        assert_eq!(q.search.as_deref(), Some("Tokyo"));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Tokyo"), "%tokyo%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }
}
