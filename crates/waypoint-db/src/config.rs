use std::env;

/// Storage configuration.
///
/// Reads from the `WAYPOINT_DATABASE_URL` environment variable, falling back
/// to `sqlite://waypoint.db` (relative to the working directory) when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full SQLite connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "sqlite://waypoint.db";

    /// Build a config from the environment.
    ///
    /// Priority: `WAYPOINT_DATABASE_URL` env var, then the compile-time default.
    pub fn from_env() -> Self {
        let database_url = env::var("WAYPOINT_DATABASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Build a config pointing at a database file on disk.
    pub fn for_file(path: &std::path::Path) -> Self {
        Self::new(format!("sqlite://{}", path.display()))
    }

    /// The filesystem path of the database file, if the URL names one.
    ///
    /// Returns `None` for in-memory databases.
    pub fn database_path(&self) -> Option<&str> {
        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() || path == ":memory:" {
            None
        } else {
            Some(path)
        }
    }

    /// The URL with any query string (connection flags) removed, safe to
    /// show in status output.
    pub fn display_url(&self) -> &str {
        self.database_url
            .split('?')
            .next()
            .unwrap_or(&self.database_url)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
