//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every field is defaulted so an
//! empty or missing file still yields a usable configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`PLAYBILL_ROOT_FOLDER`, `PLAYBILL_CONFIG`)
//! 3. TOML configuration file
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "PLAYBILL_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "PLAYBILL_CONFIG";

/// Default crawler identification
pub const DEFAULT_USER_AGENT: &str =
    concat!("PlaybillBot/", env!("CARGO_PKG_VERSION"), " (+mailto:crawler@playbill.invalid)");

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Path to SQLite database file (defaults to `<root>/playbill.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scraper behavior
    #[serde(default)]
    pub scraper: ScraperConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Fetcher, collector and aggregation tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// User-Agent header and robots.txt identity
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Minimum spacing between requests to one host
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Hard timeout for a single page fetch
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Hard timeout for robots.txt retrieval
    #[serde(default = "default_robots_timeout_ms")]
    pub robots_timeout_ms: u64,

    /// Check robots.txt before fetching
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Companies scraped in parallel
    #[serde(default = "default_max_concurrent_companies")]
    pub max_concurrent_companies: usize,

    /// Public catalog hides companies whose last run is older than this
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,

    /// Days covered by calendar day-by-day crawls
    #[serde(default = "default_calendar_days")]
    pub calendar_days: u32,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            min_interval_ms: default_min_interval_ms(),
            timeout_ms: default_timeout_ms(),
            robots_timeout_ms: default_robots_timeout_ms(),
            respect_robots: true,
            max_concurrent_companies: default_max_concurrent_companies(),
            stale_days: default_stale_days(),
            calendar_days: default_calendar_days(),
        }
    }
}

impl ScraperConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_millis(self.robots_timeout_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_robots_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_companies() -> usize {
    4
}

fn default_stale_days() -> i64 {
    14
}

fn default_calendar_days() -> u32 {
    21
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from CLI path, `PLAYBILL_CONFIG`, or the platform config file
    ///
    /// An explicitly named file must exist. Without one, a missing platform file
    /// yields the defaults.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Self::load(Path::new(&path));
        }

        match default_config_file() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Resolve the database file path below the given root folder
    pub fn database_file(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root_folder.join(path),
            None => root_folder.join("playbill.db"),
        }
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Platform configuration file (`~/.config/playbill/config.toml` on Linux)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("playbill").join("config.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/playbill
        dirs::data_local_dir()
            .map(|d| d.join("playbill"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/playbill"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("playbill"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/playbill"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("playbill"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\playbill"))
    } else {
        PathBuf::from("./playbill_data")
    }
}
