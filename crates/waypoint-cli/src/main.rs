mod config;
mod plan_cmds;
mod serve_cmd;
mod stats_cmd;
mod views;

#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

use waypoint_core::export::ExportFormat;
use waypoint_db::config::DbConfig;
use waypoint_db::pool;
use waypoint_db::queries::plans::DEFAULT_PAGE_SIZE;

use config::WaypointConfig;

#[derive(Parser)]
#[command(
    name = "waypoint",
    version,
    about = "Turn a goal into an enriched, step-by-step plan"
)]
struct Cli {
    /// Database URL (overrides WAYPOINT_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a waypoint config file (no database required)
    Init {
        /// SQLite connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database file and apply migrations
    DbInit,
    /// Serve the web interface and JSON API
    Serve {
        /// Address to bind (overrides WAYPOINT_BIND)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides WAYPOINT_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Show totals across all stored plans
    Stats,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Generate, enrich and store a plan for a goal
    Create {
        /// The goal, e.g. "Plan a 3-day trip to Tokyo"
        #[arg(required = true, num_args = 1..)]
        goal: Vec<String>,
    },
    /// Show one plan with all of its steps
    Show {
        /// Plan ID (UUID)
        plan_id: String,
    },
    /// List stored plans, newest first
    List {
        /// Case-insensitive substring of the goal
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: i64,
    },
    /// Delete a plan and its steps
    Delete {
        /// Plan ID (UUID)
        plan_id: String,
    },
    /// Export a plan as JSON, CSV or Markdown
    Export {
        /// Plan ID (UUID)
        plan_id: String,
        /// json, csv, or markdown
        #[arg(long, short, default_value = "markdown")]
        format: ExportFormat,
        /// File or directory to write to (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Execute the `waypoint init` command: write the config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: Some(db_url.to_string()),
        },
        server: config::ServerSection {
            bind: Some(config::DEFAULT_BIND.to_string()),
            port: Some(config::DEFAULT_PORT),
        },
        ..config::ConfigFile::default()
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!(
        "  server       = {}:{}",
        config::DEFAULT_BIND,
        config::DEFAULT_PORT
    );
    println!();
    println!("Optional: set OPENAI_API_KEY, SEARCH_API_KEY + SEARCH_ENGINE_ID and WEATHER_API_KEY");
    println!("(or the matching [llm], [search] and [weather] sections) for live data.");
    println!("Next: run `waypoint db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `waypoint db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = WaypointConfig::resolve(cli_db_url)?;

    println!("Initializing waypoint database...");

    let db_pool = open_store(&resolved.db_config).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready at {}. Tables:", resolved.db_config.display_url());
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("waypoint db-init complete.");
    Ok(())
}

/// Open the store, creating and migrating it if needed.
async fn open_store(db_config: &DbConfig) -> anyhow::Result<SqlitePool> {
    let db_pool = pool::create_pool(db_config).await?;
    if let Err(e) = pool::run_migrations(&db_pool).await {
        db_pool.close().await;
        return Err(e);
    }
    Ok(db_pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so exports on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = WaypointConfig::resolve(cli.database_url.as_deref())?
                .with_listen(bind.as_deref(), port)?;
            let pipeline = resolved.build_pipeline()?;
            let db_pool = open_store(&resolved.db_config).await?;
            let state = serve_cmd::AppState::new(
                db_pool.clone(),
                pipeline,
                resolved.db_config.display_url(),
            );
            let result = serve_cmd::run_serve(state, resolved.listen_addr)
                .await
                .with_context(|| format!("server on {} failed", resolved.listen_addr));
            db_pool.close().await;
            result?;
        }
        Commands::Plan { command } => {
            let resolved = WaypointConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = open_store(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool, &resolved).await;
            db_pool.close().await;
            result?;
        }
        Commands::Stats => {
            let resolved = WaypointConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = open_store(&resolved.db_config).await?;
            let result = stats_cmd::run_stats(&db_pool, &resolved.db_config).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plan_create_joins_words() {
        let cli = Cli::try_parse_from(["waypoint", "plan", "create", "Learn", "Rust"]).unwrap();
        match cli.command {
            Commands::Plan {
                command: PlanCommands::Create { goal },
            } => assert_eq!(goal.join(" "), "Learn Rust"),
            _ => panic!("expected plan create"),
        }
    }

    #[test]
    fn export_format_is_parsed_by_clap() {
        let cli = Cli::try_parse_from([
            "waypoint", "plan", "export", "some-id", "--format", "CSV",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan {
                command: PlanCommands::Export { format, output, .. },
            } => {
                assert_eq!(format, ExportFormat::Csv);
                assert!(output.is_none());
            }
            _ => panic!("expected plan export"),
        }

        assert!(
            Cli::try_parse_from(["waypoint", "plan", "export", "id", "--format", "pdf"]).is_err()
        );
    }

    #[test]
    fn list_defaults() {
        let cli = Cli::try_parse_from(["waypoint", "plan", "list"]).unwrap();
        match cli.command {
            Commands::Plan {
                command:
                    PlanCommands::List {
                        search,
                        page,
                        page_size,
                    },
            } => {
                assert!(search.is_none());
                assert_eq!(page, 1);
                assert_eq!(page_size, DEFAULT_PAGE_SIZE);
            }
            _ => panic!("expected plan list"),
        }
    }

    #[test]
    fn global_database_url_flag() {
        let cli =
            Cli::try_parse_from(["waypoint", "stats", "--database-url", "sqlite://x.db"]).unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("sqlite://x.db"));
    }
}
