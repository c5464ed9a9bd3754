//! Integration tests for database migrations and connection pooling.

use waypoint_db::config::DbConfig;
use waypoint_db::pool;
use waypoint_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_expected_tables() {
    let db = create_test_db().await;

    let counts = pool::table_counts(&db.pool).await.unwrap();
    let names: Vec<&str> = counts.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["plan_steps", "plans"]);
    assert!(counts.iter().all(|(_, count)| *count == 0));

    drop_test_db(db).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = create_test_db().await;
    pool::run_migrations(&db.pool)
        .await
        .expect("second run should be a no-op");
    drop_test_db(db).await;
}

#[tokio::test]
async fn create_pool_creates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.db");
    assert!(!path.exists());

    let config = DbConfig::for_file(&path);
    let pool = pool::create_pool(&config).await.unwrap();
    pool::run_migrations(&pool).await.unwrap();
    pool.close().await;

    assert!(path.exists());
}

#[tokio::test]
async fn foreign_keys_are_enforced() {
    let db = create_test_db().await;

    let orphan = sqlx::query(
        "INSERT INTO plan_steps (plan_id, step_number, title, description, \
         estimated_duration, requires_research) VALUES (?, 1, 't', 'd', '1 hour', 0)",
    )
    .bind(uuid::Uuid::new_v4())
    .execute(&db.pool)
    .await;
    assert!(orphan.is_err(), "step without a parent plan must be rejected");

    drop_test_db(db).await;
}
