//! Configuration file management for waypoint.
//!
//! Provides a TOML-based config file at `~/.config/waypoint/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use waypoint_core::PlanPipeline;
use waypoint_core::enrich::{
    Enricher, EnrichmentCache, GoogleSearcher, MockSearcher, MockWeather, OpenWeatherMap,
    Searcher, WeatherSource,
};
use waypoint_core::llm::{LlmClient, LlmConfig, OpenAiClient};
use waypoint_core::planner::Planner;
use waypoint_db::config::DbConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub server: ServerSection,
    pub llm: LlmSection,
    pub search: SearchSection,
    pub weather: WeatherSection,
    pub enrichment: EnrichmentSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSection {
    /// Per-request timeout for search and weather lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the waypoint config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/waypoint` or `~/.config/waypoint`,
/// on macOS too.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("waypoint");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("waypoint")
}

/// Return the path to the waypoint config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since the file may hold API keys.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Environment lookups
// -----------------------------------------------------------------------

/// Reads settings from an environment-like source. Blank values count as
/// unset so `OPENAI_API_KEY=` in a shell profile disables the client.
struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.string(key)
            .map(|raw| {
                raw.parse::<T>()
                    .with_context(|| format!("{key} has an invalid value: {raw:?}"))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.string(key) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => bail!("{key} must be true or false, got {raw:?}"),
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn positive_secs(setting: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        bail!("{setting} must be a positive number of seconds");
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bind(bind: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = bind
        .trim()
        .parse()
        .with_context(|| format!("invalid bind address {bind:?}"))?;
    Ok(SocketAddr::new(ip, port))
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Google Custom Search needs both halves to work.
#[derive(Clone)]
pub struct SearchCredentials {
    pub api_key: String,
    pub engine_id: String,
}

/// Fully resolved configuration, ready for use.
pub struct WaypointConfig {
    pub db_config: DbConfig,
    pub listen_addr: SocketAddr,
    /// `None` means plans always come from the fallback generator.
    pub llm: Option<LlmConfig>,
    pub search: Option<SearchCredentials>,
    pub weather_api_key: Option<String>,
    pub http_timeout: Duration,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
}

impl fmt::Debug for WaypointConfig {
    // Keys stay out of logs and panic messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaypointConfig")
            .field("database_url", &self.db_config.display_url())
            .field("listen_addr", &self.listen_addr)
            .field("llm_model", &self.llm.as_ref().map(|c| c.model.as_str()))
            .field("search", &self.search.is_some())
            .field("weather", &self.weather_api_key.is_some())
            .field("http_timeout", &self.http_timeout)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl WaypointConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = if config_path().exists() {
            Some(load_config()?)
        } else {
            None
        };
        let lookup = |key: &str| std::env::var(key).ok();
        Self::resolve_from(cli_db_url, file_config.as_ref(), &lookup)
    }

    /// Resolution against an explicit config file and environment.
    fn resolve_from(
        cli_db_url: Option<&str>,
        file: Option<&ConfigFile>,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = Env { lookup };
        let empty = ConfigFile::default();
        let file = file.unwrap_or(&empty);

        let db_url = cli_db_url
            .map(str::to_owned)
            .or_else(|| env.string("WAYPOINT_DATABASE_URL"))
            .or_else(|| non_blank(file.database.url.as_ref()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());
        let db_config = DbConfig::new(db_url);

        let bind = env
            .string("WAYPOINT_BIND")
            .or_else(|| non_blank(file.server.bind.as_ref()))
            .unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let port = match env.parse::<u16>("WAYPOINT_PORT")? {
            Some(port) => port,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };
        let listen_addr = parse_bind(&bind, port)?;

        let llm_timeout_secs = match env.parse::<u64>("WAYPOINT_LLM_TIMEOUT_SECS")? {
            Some(secs) => secs,
            None => file
                .llm
                .timeout_secs
                .unwrap_or(LlmConfig::DEFAULT_TIMEOUT.as_secs()),
        };
        let llm_timeout = positive_secs("LLM timeout", llm_timeout_secs)?;
        let llm = env
            .string("OPENAI_API_KEY")
            .or_else(|| non_blank(file.llm.api_key.as_ref()))
            .map(|api_key| LlmConfig {
                api_key,
                model: env
                    .string("WAYPOINT_LLM_MODEL")
                    .or_else(|| non_blank(file.llm.model.as_ref()))
                    .unwrap_or_else(|| LlmConfig::DEFAULT_MODEL.to_owned()),
                base_url: env
                    .string("OPENAI_BASE_URL")
                    .or_else(|| non_blank(file.llm.base_url.as_ref()))
                    .unwrap_or_else(|| LlmConfig::DEFAULT_BASE_URL.to_owned()),
                timeout: llm_timeout,
            });

        let search_key = env
            .string("SEARCH_API_KEY")
            .or_else(|| non_blank(file.search.api_key.as_ref()));
        let engine_id = env
            .string("SEARCH_ENGINE_ID")
            .or_else(|| non_blank(file.search.engine_id.as_ref()));
        let search = match (search_key, engine_id) {
            (Some(api_key), Some(engine_id)) => Some(SearchCredentials { api_key, engine_id }),
            (Some(_), None) => {
                warn!("search API key set without SEARCH_ENGINE_ID; using mock search results");
                None
            }
            (None, Some(_)) => {
                warn!("SEARCH_ENGINE_ID set without a search API key; using mock search results");
                None
            }
            (None, None) => None,
        };

        let weather_api_key = env
            .string("WEATHER_API_KEY")
            .or_else(|| non_blank(file.weather.api_key.as_ref()));

        let http_timeout_secs = match env.parse::<u64>("WAYPOINT_HTTP_TIMEOUT_SECS")? {
            Some(secs) => secs,
            None => file
                .enrichment
                .timeout_secs
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        };
        let http_timeout = positive_secs("enrichment timeout", http_timeout_secs)?;

        let cache_enabled = match env.flag("WAYPOINT_CACHE_ENABLED")? {
            Some(enabled) => enabled,
            None => file.enrichment.cache_enabled.unwrap_or(true),
        };
        let cache_ttl_secs = match env.parse::<u64>("WAYPOINT_CACHE_TTL_SECS")? {
            Some(secs) => secs,
            None => file
                .enrichment
                .cache_ttl_secs
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
        };
        let cache_ttl = positive_secs("cache TTL", cache_ttl_secs)?;

        Ok(Self {
            db_config,
            listen_addr,
            llm,
            search,
            weather_api_key,
            http_timeout,
            cache_enabled,
            cache_ttl,
        })
    }

    /// Apply `waypoint serve --bind/--port` on top of the resolved address.
    pub fn with_listen(mut self, bind: Option<&str>, port: Option<u16>) -> Result<Self> {
        let ip = match bind {
            Some(bind) => parse_bind(bind, 0)?.ip(),
            None => self.listen_addr.ip(),
        };
        self.listen_addr = SocketAddr::new(ip, port.unwrap_or(self.listen_addr.port()));
        Ok(self)
    }

    /// Pick live or mock providers once, based on which credentials are set.
    pub fn build_pipeline(&self) -> Result<PlanPipeline> {
        let planner = match &self.llm {
            Some(llm_config) => {
                let client =
                    OpenAiClient::new(llm_config.clone()).context("failed to build LLM client")?;
                info!(model = client.model(), "LLM plan generation enabled");
                let client: Arc<dyn LlmClient> = Arc::new(client);
                Planner::new(Some(client))
            }
            None => {
                info!("OPENAI_API_KEY not set; plans use the fallback generator");
                Planner::offline()
            }
        };

        let searcher: Arc<dyn Searcher> = match &self.search {
            Some(creds) => Arc::new(
                GoogleSearcher::new(&creds.api_key, &creds.engine_id, self.http_timeout)
                    .context("failed to build search client")?,
            ),
            None => Arc::new(MockSearcher),
        };
        let weather: Arc<dyn WeatherSource> = match &self.weather_api_key {
            Some(key) => Arc::new(
                OpenWeatherMap::new(key, self.http_timeout)
                    .context("failed to build weather client")?,
            ),
            None => Arc::new(MockWeather),
        };
        let cache = if self.cache_enabled {
            EnrichmentCache::new(self.cache_ttl)
        } else {
            EnrichmentCache::disabled()
        };

        let enricher = Enricher::new(searcher, weather, cache);
        info!(
            searcher = enricher.searcher_name(),
            weather = enricher.weather_name(),
            cache_enabled = self.cache_enabled,
            "enrichment providers selected"
        );
        Ok(PlanPipeline::new(planner, enricher))
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
