//! Integration tests for the `waypoint` binary.
//!
//! Each test points the binary at its own SQLite file and config directory
//! inside a temp dir, with every provider credential removed so plans come
//! from the fallback generator and mock enrichment.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;
use waypoint_db::models::Plan;

const TOKYO_GOAL: &str = "Plan a 3-day trip to Tokyo with cultural sites and food";

const CREDENTIAL_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "SEARCH_API_KEY",
    "SEARCH_ENGINE_ID",
    "WEATHER_API_KEY",
    "WAYPOINT_DATABASE_URL",
    "WAYPOINT_CACHE_ENABLED",
    "WAYPOINT_PORT",
    "WAYPOINT_BIND",
];

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

fn waypoint(home: &Path, args: &[&str]) -> Output {
    let db_url = format!("sqlite://{}", home.join("cli.db").display());
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_waypoint"));
    cmd.args(args)
        .arg("--database-url")
        .arg(&db_url)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("RUST_LOG", "warn");
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd.output().expect("failed to run waypoint binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed\nstdout: {}\nstderr: {}",
        stdout(output),
        stderr(output)
    );
}

fn create_plan(home: &Path, goal: &str) -> String {
    let output = waypoint(home, &["plan", "create", goal]);
    assert_success(&output);
    let text = stdout(&output);
    text.lines()
        .find_map(|line| line.trim().strip_prefix("Plan ID:"))
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| panic!("no plan ID in output:\n{text}"))
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[test]
fn db_init_reports_tables() {
    let home = TempDir::new().unwrap();

    let output = waypoint(home.path(), &["db-init"]);
    assert_success(&output);
    let text = stdout(&output);
    assert!(text.contains("plans: 0 rows"), "{text}");
    assert!(text.contains("plan_steps: 0 rows"), "{text}");
    assert!(home.path().join("cli.db").exists());
}

#[test]
fn create_show_list_export_delete_workflow() {
    let home = TempDir::new().unwrap();
    let id = create_plan(home.path(), TOKYO_GOAL);

    // Show
    let output = waypoint(home.path(), &["plan", "show", &id]);
    assert_success(&output);
    let text = stdout(&output);
    assert!(text.contains(TOKYO_GOAL), "{text}");
    assert!(text.contains("Weather: Tokyo, JP"), "{text}");
    assert!(text.contains("6 hours, 30 minutes"), "{text}");

    // List
    let output = waypoint(home.path(), &["plan", "list", "--search", "tokyo"]);
    assert_success(&output);
    let text = stdout(&output);
    assert!(text.contains(&id), "{text}");
    assert!(text.contains("Page 1 of 1 (1 plans)"), "{text}");

    // Export to stdout parses back into the stored plan.
    let output = waypoint(home.path(), &["plan", "export", &id, "--format", "json"]);
    assert_success(&output);
    let exported: Plan = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(exported.id.to_string(), id);
    assert_eq!(exported.goal, TOKYO_GOAL);
    assert_eq!(exported.steps.len(), 4);

    // Export into a directory picks a timestamped file name.
    let out_dir = home.path().join("exports");
    std::fs::create_dir(&out_dir).unwrap();
    let output = waypoint(
        home.path(),
        &["plan", "export", &id, "-f", "csv", "-o", out_dir.to_str().unwrap()],
    );
    assert_success(&output);
    let files: Vec<_> = std::fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("plan_") && files[0].ends_with(".csv"), "{files:?}");

    // Stats
    let output = waypoint(home.path(), &["stats"]);
    assert_success(&output);
    let text = stdout(&output);
    assert!(text.contains("Plans:             1"), "{text}");
    assert!(text.contains("Steps:             4"), "{text}");

    // Delete, then the plan is gone.
    let output = waypoint(home.path(), &["plan", "delete", &id]);
    assert_success(&output);
    assert!(stdout(&output).contains("deleted"));

    let output = waypoint(home.path(), &["plan", "show", &id]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"), "{}", stderr(&output));
}

#[test]
fn create_accepts_unquoted_words() {
    let home = TempDir::new().unwrap();
    let output = waypoint(home.path(), &["plan", "create", "Learn", "to", "bake", "bread"]);
    assert_success(&output);
    assert!(stdout(&output).contains("Plan: Learn to bake bread"));
}

#[test]
fn create_rejects_invalid_goal() {
    let home = TempDir::new().unwrap();

    let output = waypoint(home.path(), &["plan", "create", "<script>alert(1)</script>"]);
    assert!(!output.status.success());

    let output = waypoint(home.path(), &["plan", "list"]);
    assert_success(&output);
    assert!(stdout(&output).contains("No plans found"));
}

#[test]
fn delete_missing_plan_fails() {
    let home = TempDir::new().unwrap();
    let output = waypoint(
        home.path(),
        &["plan", "delete", "00000000-0000-4000-8000-000000000000"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

#[test]
fn init_writes_config_once() {
    let home = TempDir::new().unwrap();

    let output = waypoint(home.path(), &["init"]);
    assert_success(&output);
    let path = home.path().join("config").join("waypoint").join("config.toml");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[database]"), "{contents}");
    assert!(contents.contains("sqlite://waypoint.db"), "{contents}");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let output = waypoint(home.path(), &["init"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));

    let output = waypoint(home.path(), &["init", "--force", "--db-url", "sqlite://other.db"]);
    assert_success(&output);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("sqlite://other.db"), "{contents}");
}
