//! Shared test utilities for waypoint integration tests.
//!
//! Every test gets its own SQLite file inside a temporary directory, with
//! migrations applied. The directory (and the database with it) is removed
//! when the returned [`TestDb`] is dropped.

use sqlx::SqlitePool;
use tempfile::TempDir;

use waypoint_db::config::DbConfig;
use waypoint_db::pool;

/// A migrated throw-away database.
pub struct TestDb {
    pub pool: SqlitePool,
    pub config: DbConfig,
    /// Held to keep the directory alive for the lifetime of the pool.
    _dir: TempDir,
}

/// Create a temporary database with migrations applied.
pub async fn create_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = DbConfig::for_file(&dir.path().join("waypoint_test.db"));

    let pool = pool::create_pool(&config)
        .await
        .expect("failed to open temp database");
    pool::run_migrations(&pool)
        .await
        .expect("migrations should succeed");

    TestDb {
        pool,
        config,
        _dir: dir,
    }
}

/// Close the pool and remove the database directory.
///
/// Dropping the [`TestDb`] also cleans up; this variant waits for open
/// connections to finish first.
pub async fn drop_test_db(db: TestDb) {
    db.pool.close().await;
    drop(db._dir);
}
