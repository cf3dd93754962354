//! Configuration management for listingscout.
//!
//! Settings start from built-in defaults, are overlaid by an optional config
//! file (TOML, YAML or JSON by extension) and finally by environment
//! variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::DieselDbContext;
use crate::scrapers::{HttpSourceConfig, RetryPolicy};
use crate::services::{ExecutorOptions, TwilioOptions};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "listingscout.db";

/// Config filenames looked for when none is given explicitly.
const CONFIG_CANDIDATES: [&str; 4] = [
    "listingscout.toml",
    "listingscout.yaml",
    "listingscout.yml",
    "listingscout.json",
];

const LOGS_SUBDIR: &str = "logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Directory for per-execution log files.
    pub log_dir: PathBuf,
    /// Listing provider API root.
    pub listing_api_url: String,
    pub proxy_url: Option<String>,
    /// None, "browser" or a literal user agent.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between result pages in milliseconds.
    pub page_delay_ms: u64,
    /// Detail fetches per search configuration per run.
    pub listing_limit: usize,
    /// Concurrent detail fetches within one configuration.
    pub detail_concurrency: usize,
    /// How often the scheduler checks whether a run is due, in seconds.
    pub poll_interval_secs: u64,
    pub twilio: TwilioOptions,
}

impl Default for Settings {
    fn default() -> Self {
        // Platform data dir, then home, then cwd
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("listingscout");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let source = HttpSourceConfig::default();
        let executor = ExecutorOptions::default();
        Self {
            log_dir: data_dir.join(LOGS_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            listing_api_url: source.base_url,
            proxy_url: None,
            user_agent: None,
            request_timeout: source.request_timeout.as_secs(),
            page_delay_ms: u64::try_from(source.page_delay.as_millis()).unwrap_or(250),
            listing_limit: executor.listing_limit,
            detail_concurrency: executor.detail_concurrency,
            poll_interval_secs: 30,
            twilio: TwilioOptions::default(),
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!("sqlite:{}", self.database_path().display()),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_url.is_some() || self.database_path().exists()
    }

    /// Ensure data and log directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (dir, label) in [(&self.data_dir, "data"), (&self.log_dir, "log")] {
            tracing::debug!("Ensuring {} directory: {}", label, dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {} directory '{}': {}", label, dir.display(), e),
                )
            })?;
        }
        Ok(())
    }

    pub fn create_db_context(&self) -> DieselDbContext {
        DieselDbContext::from_url(&self.database_url())
    }

    pub fn source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            base_url: self.listing_api_url.clone(),
            proxy_url: self.proxy_url.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            listing_limit: self.listing_limit,
            detail_concurrency: self.detail_concurrency,
            log_dir: self.log_dir.clone(),
            search_policy: RetryPolicy::search_default(),
            detail_policy: RetryPolicy::detail_default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Overlay environment variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("DATABASE_URL") {
            tracing::debug!("Using DATABASE_URL from environment: {}", url);
            self.database_url = Some(url);
        }
        if let Some(url) = get("LISTING_API_URL") {
            self.listing_api_url = url;
        }
        if let Some(proxy) = get("LISTING_PROXY_URL") {
            self.proxy_url = Some(proxy);
        }
        if let Some(sid) = get("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = sid;
        }
        if let Some(token) = get("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = token;
        }
        if let Some(number) = get("TWILIO_PHONE_NUMBER") {
            self.twilio.from_number = number;
        }
    }
}

/// Twilio section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwilioSection {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    #[serde(alias = "from_number")]
    pub phone_number: Option<String>,
}

/// Configuration file structure. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<String>,
    pub database: Option<String>,
    pub log_dir: Option<String>,
    pub listing_api_url: Option<String>,
    pub proxy_url: Option<String>,
    pub user_agent: Option<String>,
    pub request_timeout: Option<u64>,
    pub page_delay_ms: Option<u64>,
    pub listing_limit: Option<usize>,
    pub detail_concurrency: Option<usize>,
    pub poll_interval_secs: Option<u64>,
    pub twilio: Option<TwilioSection>,

    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "json" => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
        }
    }

    /// Directory relative paths in the file are resolved against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
    }

    /// Resolve a path that may be relative to the config file or start with `~`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(data_dir) = &self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.log_dir = settings.data_dir.join(LOGS_SUBDIR);
        }
        if let Some(database) = &self.database {
            if database.contains("://") || database.starts_with("sqlite:") {
                settings.database_url = Some(database.clone());
            } else {
                settings.database_filename = database.clone();
            }
        }
        if let Some(log_dir) = &self.log_dir {
            settings.log_dir = self.resolve_path(log_dir, base_dir);
        }
        if let Some(url) = &self.listing_api_url {
            settings.listing_api_url = url.clone();
        }
        if self.proxy_url.is_some() {
            settings.proxy_url = self.proxy_url.clone();
        }
        if self.user_agent.is_some() {
            settings.user_agent = self.user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.page_delay_ms {
            settings.page_delay_ms = delay;
        }
        if let Some(limit) = self.listing_limit {
            settings.listing_limit = limit;
        }
        if let Some(n) = self.detail_concurrency {
            settings.detail_concurrency = n.max(1);
        }
        if let Some(secs) = self.poll_interval_secs {
            settings.poll_interval_secs = secs;
        }
        if let Some(twilio) = &self.twilio {
            if let Some(sid) = &twilio.account_sid {
                settings.twilio.account_sid = sid.clone();
            }
            if let Some(token) = &twilio.auth_token {
                settings.twilio.auth_token = token.clone();
            }
            if let Some(number) = &twilio.phone_number {
                settings.twilio.from_number = number.clone();
            }
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// First known config filename present in `dir`.
fn find_config_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Load settings: defaults, then config file, then `--data`, then environment.
///
/// An explicit config path that can't be loaded is an error; a discovered
/// one that can't be loaded is logged and skipped.
pub fn load_settings_with_options(options: &LoadOptions) -> Result<Settings, ConfigError> {
    let mut settings = match &options.data_dir {
        Some(dir) => Settings::with_data_dir(dir.clone()),
        None => Settings::default(),
    };
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let config = match &options.config_path {
        Some(path) => Some(Config::load_from_path(path)?),
        None => find_config_in(&settings.data_dir)
            .or_else(|| find_config_in(&cwd))
            .and_then(|path| match Config::load_from_path(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Ignoring config file: {}", e);
                    None
                }
            }),
    };

    if let Some(config) = config {
        tracing::debug!("Loaded config from {:?}", config.source_path);
        let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
        config.apply_to_settings(&mut settings, &base_dir);
    }

    // --data beats the file's data_dir
    if let Some(dir) = &options.data_dir {
        settings.data_dir = dir.clone();
        settings.log_dir = dir.join(LOGS_SUBDIR);
    }

    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_database_url_from_path() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/scout"));
        assert_eq!(settings.database_url(), "sqlite:/tmp/scout/listingscout.db");
        assert_eq!(settings.log_dir, PathBuf::from("/tmp/scout/logs"));
    }

    #[test]
    fn test_parse_formats() {
        let toml_cfg = Config::parse("listing_limit = 5\n[twilio]\nphone_number = \"+15550001111\"\n", "toml").unwrap();
        assert_eq!(toml_cfg.listing_limit, Some(5));
        assert_eq!(
            toml_cfg.twilio.unwrap().phone_number.as_deref(),
            Some("+15550001111")
        );

        let yaml_cfg = Config::parse("proxy_url: socks5://127.0.0.1:9050\n", "yaml").unwrap();
        assert_eq!(yaml_cfg.proxy_url.as_deref(), Some("socks5://127.0.0.1:9050"));

        // Legacy twilio_config.json layout
        let json_cfg = Config::parse(
            r#"{"twilio": {"account_sid": "AC1", "auth_token": "t", "phone_number": "+1555"}}"#,
            "json",
        )
        .unwrap();
        assert_eq!(json_cfg.twilio.unwrap().account_sid.as_deref(), Some("AC1"));

        assert!(matches!(
            Config::parse("listing_limit = \"many\"", "toml"),
            Err(ConfigError::Parse { format: "TOML", .. })
        ));
    }

    #[test]
    fn test_apply_resolves_relative_paths() {
        let config = Config {
            data_dir: Some("data".to_string()),
            database: Some("scout.sqlite".to_string()),
            detail_concurrency: Some(0),
            ..Default::default()
        };
        let mut settings = Settings::with_data_dir(PathBuf::from("/unused"));
        config.apply_to_settings(&mut settings, Path::new("/etc/scout"));

        assert_eq!(settings.data_dir, PathBuf::from("/etc/scout/data"));
        assert_eq!(settings.database_path(), PathBuf::from("/etc/scout/data/scout.sqlite"));
        assert_eq!(settings.detail_concurrency, 1);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:/var/lib/scout.db"),
            ("TWILIO_ACCOUNT_SID", "AC9"),
            ("LISTING_PROXY_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::with_data_dir(PathBuf::from("/tmp/scout"));
        settings.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.database_url(), "sqlite:/var/lib/scout.db");
        assert_eq!(settings.twilio.account_sid, "AC9");
        assert!(settings.proxy_url.is_none());
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.toml");
        fs::write(&path, "log_dir = \"runs\"\npoll_interval_secs = 5\n").unwrap();

        let settings = load_settings_with_options(&LoadOptions {
            config_path: Some(path),
            data_dir: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        // --data resets the log dir after the file is applied
        assert_eq!(settings.log_dir, dir.path().join("logs"));
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));

        let missing = load_settings_with_options(&LoadOptions {
            config_path: Some(dir.path().join("missing.toml")),
            data_dir: None,
        });
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
