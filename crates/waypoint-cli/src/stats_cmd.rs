//! `waypoint stats`: store-wide totals.

use anyhow::Result;
use sqlx::SqlitePool;

use waypoint_db::config::DbConfig;
use waypoint_db::queries::plans as plan_queries;

pub async fn run_stats(pool: &SqlitePool, db_config: &DbConfig) -> Result<()> {
    let stats = plan_queries::plan_stats(pool, db_config.display_url()).await?;

    println!("Database:          {}", stats.database_url);
    println!("Plans:             {}", stats.total_plans);
    println!("Steps:             {}", stats.total_steps);
    println!("Plans (last 7d):   {}", stats.recent_plans);
    println!("Avg steps / plan:  {:.2}", stats.average_steps_per_plan);
    Ok(())
}
