//! Integration tests for the plan creation service.
//!
//! Runs the full validate, generate, enrich and store pipeline against a
//! temporary SQLite database with offline providers.

use std::sync::Arc;

use async_trait::async_trait;

use waypoint_core::enrich::Enricher;
use waypoint_core::export::{ExportFormat, render_plan};
use waypoint_core::llm::{ChatRequest, LlmClient, LlmError};
use waypoint_core::planner::Planner;
use waypoint_core::{CreatePlanError, GoalError, PlanPipeline, create_plan};
use waypoint_db::models::{AiProvider, Plan};
use waypoint_db::queries::plans::{self, PlanQuery};
use waypoint_test_utils::{create_test_db, drop_test_db};

/// Always fails as if the provider timed out.
struct DownLlm;

#[async_trait]
impl LlmClient for DownLlm {
    fn name(&self) -> &str {
        "down"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
        Err(LlmError::Status {
            status: 504,
            body: "gateway timeout".to_string(),
        })
    }
}

const TOKYO_GOAL: &str = "Plan a 3-day trip to Tokyo with cultural sites and food";

#[tokio::test]
async fn offline_pipeline_stores_complete_plan() {
    let db = create_test_db().await;
    let pipeline = PlanPipeline::offline();

    let plan = create_plan(&db.pool, &pipeline, &format!("  {TOKYO_GOAL}  "))
        .await
        .unwrap();

    assert_eq!(plan.goal, TOKYO_GOAL);
    assert_eq!(plan.total_steps, 4);
    assert_eq!(plan.estimated_total_duration, "6 hours, 30 minutes");
    assert_eq!(plan.metadata.ai_provider, AiProvider::Fallback);
    assert!(plan.metadata.has_web_research);
    assert!(plan.metadata.has_weather_info);
    assert_eq!(
        plan.metadata.research_topics,
        vec![TOKYO_GOAL.to_string(), format!("how to {TOKYO_GOAL}")]
    );

    let stored = plans::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(stored, plan);

    drop_test_db(db).await;
}

#[tokio::test]
async fn failing_llm_still_produces_a_plan() {
    let db = create_test_db().await;
    let pipeline = PlanPipeline::new(
        Planner::new(Some(Arc::new(DownLlm) as Arc<dyn LlmClient>)),
        Enricher::offline(),
    );

    let plan = create_plan(&db.pool, &pipeline, "Learn to play chess")
        .await
        .unwrap();
    assert_eq!(plan.metadata.ai_provider, AiProvider::Fallback);
    assert!(!plan.steps.is_empty());
    assert!(!plan.metadata.has_weather_info);

    drop_test_db(db).await;
}

#[tokio::test]
async fn invalid_goal_is_rejected_before_storage() {
    let db = create_test_db().await;
    let pipeline = PlanPipeline::offline();

    let err = create_plan(&db.pool, &pipeline, "   ").await.unwrap_err();
    assert!(matches!(err, CreatePlanError::InvalidGoal(GoalError::Empty)));

    let err = create_plan(&db.pool, &pipeline, &"x".repeat(501))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CreatePlanError::InvalidGoal(GoalError::TooLong { .. })
    ));

    let page = plans::list_plans(&db.pool, &PlanQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);

    drop_test_db(db).await;
}

#[tokio::test]
async fn storage_failure_is_surfaced() {
    let db = create_test_db().await;
    db.pool.close().await;

    let err = create_plan(&db.pool, &PlanPipeline::offline(), "Learn to knit")
        .await
        .unwrap_err();
    assert!(matches!(err, CreatePlanError::Storage(_)));
}

#[tokio::test]
async fn json_export_roundtrips_stored_plan() {
    let db = create_test_db().await;
    let plan = create_plan(&db.pool, &PlanPipeline::offline(), TOKYO_GOAL)
        .await
        .unwrap();

    let stored = plans::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    let json = render_plan(&stored, ExportFormat::Json).unwrap();
    let parsed: Plan = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.goal, stored.goal);
    assert_eq!(parsed.steps.len(), stored.steps.len());
    let titles = |p: &Plan| p.steps.iter().map(|s| s.title.clone()).collect::<Vec<_>>();
    assert_eq!(titles(&parsed), titles(&stored));
    assert_eq!(parsed, stored);

    drop_test_db(db).await;
}
