//! Operator CLI handlers for `waypoint plan` subcommands.
//!
//! Implements:
//! - `waypoint plan create <goal>...`  -- generate, enrich and store a plan
//! - `waypoint plan show <plan-id>`    -- print one plan with its steps
//! - `waypoint plan list`              -- paginated, searchable listing
//! - `waypoint plan delete <plan-id>`  -- remove a plan and its steps
//! - `waypoint plan export <plan-id>`  -- render as JSON, CSV or Markdown

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use waypoint_core::create_plan;
use waypoint_core::export::{ExportFormat, render_plan};
use waypoint_db::models::Plan;
use waypoint_db::queries::plans::{self as plan_queries, PlanQuery};

use crate::PlanCommands;
use crate::config::WaypointConfig;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    pool: &SqlitePool,
    config: &WaypointConfig,
) -> Result<()> {
    match command {
        PlanCommands::Create { goal } => cmd_create(pool, config, &goal.join(" ")).await,
        PlanCommands::Show { plan_id } => cmd_show(pool, &plan_id).await,
        PlanCommands::List {
            search,
            page,
            page_size,
        } => cmd_list(pool, search, page, page_size).await,
        PlanCommands::Delete { plan_id } => cmd_delete(pool, &plan_id).await,
        PlanCommands::Export {
            plan_id,
            format,
            output,
        } => cmd_export(pool, &plan_id, format, output.as_deref()).await,
    }
}

fn parse_plan_id(raw: &str) -> Result<Uuid> {
    raw.parse()
        .with_context(|| format!("invalid plan ID: {raw:?}"))
}

async fn fetch_plan(pool: &SqlitePool, plan_id: Uuid) -> Result<Plan> {
    match plan_queries::get_plan(pool, plan_id).await? {
        Some(plan) => Ok(plan),
        None => bail!("plan {plan_id} not found"),
    }
}

// -----------------------------------------------------------------------
// waypoint plan create <goal>
// -----------------------------------------------------------------------

async fn cmd_create(pool: &SqlitePool, config: &WaypointConfig, goal: &str) -> Result<()> {
    let pipeline = config.build_pipeline()?;
    let plan = create_plan(pool, &pipeline, goal).await?;

    println!("Plan created successfully.");
    println!();
    print_header(&plan);
    println!();
    println!("Run `waypoint plan show {}` for the full plan.", plan.id);
    Ok(())
}

// -----------------------------------------------------------------------
// waypoint plan show <plan-id>
// -----------------------------------------------------------------------

fn print_header(plan: &Plan) {
    println!("Plan: {}", plan.goal);
    println!("  Plan ID:      {}", plan.id);
    println!(
        "  Created:      {}",
        plan.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Steps:        {}", plan.total_steps);
    println!("  Duration:     {}", plan.estimated_total_duration);
    println!("  Generated by: {}", plan.metadata.ai_provider);
    if !plan.metadata.research_topics.is_empty() {
        println!(
            "  Topics:       {}",
            plan.metadata.research_topics.join(", ")
        );
    }
}

async fn cmd_show(pool: &SqlitePool, plan_id_str: &str) -> Result<()> {
    let plan = fetch_plan(pool, parse_plan_id(plan_id_str)?).await?;
    print_header(&plan);

    if let Some(weather) = plan.steps.iter().find_map(|s| s.weather_info.as_ref()) {
        println!();
        println!(
            "Weather: {}, {} [{}]",
            weather.location, weather.country, weather.source
        );
        println!("  {}", weather.advice);
        for day in &weather.daily_forecasts {
            println!(
                "  {}  {:>5.1} / {:>5.1} C  {}",
                day.date, day.max_temp, day.min_temp, day.description
            );
        }
    }

    println!();
    println!("Steps:");
    for step in &plan.steps {
        println!();
        println!("  {}. {} ({})", step.step_number, step.title, step.estimated_duration);
        println!("     {}", step.description);
        if let Some(results) = &step.web_research {
            for r in results {
                println!("     - {} [{}]", r.title, r.source);
                println!("       {}", r.url);
            }
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------
// waypoint plan list
// -----------------------------------------------------------------------

/// Goals longer than this are cut in the table.
const GOAL_COLUMN: usize = 50;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

async fn cmd_list(
    pool: &SqlitePool,
    search: Option<String>,
    page: i64,
    page_size: i64,
) -> Result<()> {
    let query = PlanQuery {
        search,
        page,
        page_size,
    }
    .clamped();
    let result = plan_queries::list_plans(pool, &query).await?;

    if result.items.is_empty() {
        if result.total_count == 0 {
            println!("No plans found. Use `waypoint plan create <goal>` to create one.");
        } else {
            println!("No plans on page {} ({} total).", result.page, result.total_count);
        }
        return Ok(());
    }

    let id_w = 36;
    let goal_w = result
        .items
        .iter()
        .map(|p| p.goal.chars().count().min(GOAL_COLUMN))
        .max()
        .unwrap_or(4)
        .max(4);
    let steps_w = 5;

    println!("{:<id_w$}  {:<goal_w$}  {:>steps_w$}  CREATED", "ID", "GOAL", "STEPS");
    for plan in &result.items {
        println!(
            "{:<id_w$}  {:<goal_w$}  {:>steps_w$}  {}",
            plan.id,
            truncate(&plan.goal, GOAL_COLUMN),
            plan.total_steps,
            plan.created_at.format("%Y-%m-%d %H:%M"),
        );
    }

    let total_pages = (result.total_count + result.page_size - 1) / result.page_size;
    println!();
    println!(
        "Page {} of {} ({} plans)",
        result.page, total_pages, result.total_count
    );
    Ok(())
}

// -----------------------------------------------------------------------
// waypoint plan delete <plan-id>
// -----------------------------------------------------------------------

async fn cmd_delete(pool: &SqlitePool, plan_id_str: &str) -> Result<()> {
    let plan_id = parse_plan_id(plan_id_str)?;
    if !plan_queries::delete_plan(pool, plan_id).await? {
        bail!("plan {plan_id} not found");
    }
    println!("Plan {plan_id} deleted.");
    Ok(())
}

// -----------------------------------------------------------------------
// waypoint plan export <plan-id>
// -----------------------------------------------------------------------

async fn cmd_export(
    pool: &SqlitePool,
    plan_id_str: &str,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let plan = fetch_plan(pool, parse_plan_id(plan_id_str)?).await?;
    let rendered = render_plan(&plan, format).context("failed to render plan")?;

    match output {
        Some(path) => {
            // A directory gets the same timestamped name the HTTP export uses.
            let path = if path.is_dir() {
                path.join(format.filename(1, Utc::now()))
            } else {
                path.to_path_buf()
            };
            std::fs::write(&path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported plan {} as {format} to {}", plan.id, path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("Learn Rust", 50), "Learn Rust");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        let goal = "Visit Zürich and Genève during the winter holidays please";
        let cut = truncate(goal, 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn invalid_plan_id_is_reported() {
        let err = parse_plan_id("plan-7").unwrap_err();
        assert!(err.to_string().contains("invalid plan ID"), "got: {err}");
    }
}
