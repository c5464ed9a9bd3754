//! Plan creation: validate, generate, enrich, store.

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use waypoint_db::models::{NewPlan, Plan};
use waypoint_db::queries::plans;

use crate::enrich::Enricher;
use crate::goal::{Goal, GoalError};
use crate::planner::{Planner, total_duration};

/// Errors from [`create_plan`]. Upstream provider failures never appear
/// here; they end in fallback data instead.
#[derive(Debug, Error)]
pub enum CreatePlanError {
    #[error(transparent)]
    InvalidGoal(#[from] GoalError),

    #[error("failed to store plan: {0:#}")]
    Storage(anyhow::Error),
}

/// Generator plus enricher, built once at startup and shared by requests.
#[derive(Clone)]
pub struct PlanPipeline {
    planner: Planner,
    enricher: Enricher,
}

impl PlanPipeline {
    pub fn new(planner: Planner, enricher: Enricher) -> Self {
        Self { planner, enricher }
    }

    /// Fallback generator with mock enrichment. Never touches the network.
    pub fn offline() -> Self {
        Self::new(Planner::offline(), Enricher::offline())
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Generate and enrich a plan for `goal` without storing it.
    pub async fn build(&self, goal: &Goal) -> NewPlan {
        let generated = self.planner.generate(goal).await;
        let steps = self.enricher.enrich(goal.as_str(), generated.steps).await;

        NewPlan {
            goal: goal.as_str().to_owned(),
            estimated_total_duration: total_duration(&steps),
            steps,
            ai_provider: generated.provider,
        }
    }
}

/// Validate `raw_goal`, build a plan for it and persist the result.
pub async fn create_plan(
    pool: &SqlitePool,
    pipeline: &PlanPipeline,
    raw_goal: &str,
) -> Result<Plan, CreatePlanError> {
    let goal = Goal::parse(raw_goal)?;
    let started = Utc::now();

    let new_plan = pipeline.build(&goal).await;
    let plan = plans::save_plan(pool, &new_plan)
        .await
        .map_err(CreatePlanError::Storage)?;

    info!(
        plan_id = %plan.id,
        steps = plan.total_steps,
        provider = %plan.metadata.ai_provider,
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        "plan created"
    );
    Ok(plan)
}
