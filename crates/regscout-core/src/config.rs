//! Configuration management for regscout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::ProviderId;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/regscout/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser session settings
    pub browser: BrowserConfig,
    /// Query execution settings
    pub checking: CheckingConfig,
    /// Result cache settings
    pub cache: CacheConfig,
    /// Job queue settings
    pub queue: QueueConfig,
    /// On-disk storage settings
    pub storage: StorageConfig,
    /// Configured providers
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,
}

impl AppConfig {
    /// Load configuration from the default path, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if not found.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `REGSCOUT_MAX_SESSIONS`: Override the browser session cap
    /// - `REGSCOUT_HEADLESS`: Override browser headless mode (true/false)
    /// - `REGSCOUT_DEFAULT_TIMEOUT_MS`: Override the per-provider timeout
    /// - `REGSCOUT_CACHE_BACKEND`: Override the cache backend (memory/sqlite)
    pub fn load_with_env(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("REGSCOUT_MAX_SESSIONS") {
            match val.parse() {
                Ok(max) => {
                    self.browser.max_concurrent_sessions = max;
                    tracing::debug!("Override browser.max_concurrent_sessions from env: {}", max);
                }
                Err(_) => tracing::warn!("Ignoring invalid REGSCOUT_MAX_SESSIONS={}", val),
            }
        }

        if let Some(val) = lookup("REGSCOUT_HEADLESS") {
            match val.parse() {
                Ok(headless) => {
                    self.browser.headless = headless;
                    tracing::debug!("Override browser.headless from env: {}", headless);
                }
                Err(_) => tracing::warn!("Ignoring invalid REGSCOUT_HEADLESS={}", val),
            }
        }

        if let Some(val) = lookup("REGSCOUT_DEFAULT_TIMEOUT_MS") {
            match val.parse() {
                Ok(timeout_ms) => {
                    self.checking.default_timeout_ms = timeout_ms;
                    tracing::debug!("Override checking.default_timeout_ms from env: {}", timeout_ms);
                }
                Err(_) => tracing::warn!("Ignoring invalid REGSCOUT_DEFAULT_TIMEOUT_MS={}", val),
            }
        }

        if let Some(val) = lookup("REGSCOUT_CACHE_BACKEND") {
            match val.to_ascii_lowercase().as_str() {
                "memory" => self.cache.backend = StoreBackend::Memory,
                "sqlite" => self.cache.backend = StoreBackend::Sqlite,
                _ => tracing::warn!("Ignoring invalid REGSCOUT_CACHE_BACKEND={}", val),
            }
        }
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.into(),
            }
        }

        if self.browser.max_concurrent_sessions == 0 {
            return Err(invalid("browser.max_concurrent_sessions", "must be at least 1"));
        }
        if self.checking.default_timeout_ms == 0 {
            return Err(invalid("checking.default_timeout_ms", "must be at least 1"));
        }
        if self.checking.default_timeout_ms > self.checking.max_timeout_ms {
            return Err(invalid(
                "checking.default_timeout_ms",
                format!(
                    "must not exceed checking.max_timeout_ms ({})",
                    self.checking.max_timeout_ms
                ),
            ));
        }
        if self.browser.session_hard_timeout_secs.saturating_mul(1000) < self.checking.max_timeout_ms
        {
            return Err(invalid(
                "browser.session_hard_timeout_secs",
                "the session watchdog must not fire before the longest logical timeout",
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "must be at least 1"));
        }
        if self.queue.worker_concurrency == 0 {
            return Err(invalid("queue.worker_concurrency", "must be at least 1"));
        }
        if self.queue.max_attempts == 0 {
            return Err(invalid("queue.max_attempts", "must be at least 1"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id) {
                return Err(invalid(
                    "providers",
                    format!("provider '{}' is configured more than once", provider.id),
                ));
            }
            if provider.source.url_template().trim().is_empty() {
                return Err(invalid(
                    "providers.url_template",
                    format!("provider '{}' has an empty URL template", provider.id),
                ));
            }
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/regscout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/regscout`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Get the cache directory path.
    ///
    /// Uses XDG base directories: `~/.cache/regscout`
    pub fn cache_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.cache_dir().to_path_buf())
    }

    /// Resolved database path: the configured one or `<data_dir>/regscout.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("regscout.db")),
        }
    }

    /// Resolved browser profile root: the configured one or `<cache_dir>/profiles`.
    pub fn profile_root(&self) -> ConfigResult<PathBuf> {
        match &self.browser.profile_root {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::cache_dir()?.join("profiles")),
        }
    }

    /// Providers that are switched on.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "regscout", "regscout").ok_or(ConfigError::NoConfigDir)
}

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Maximum number of browser sessions open at once, system-wide
    pub max_concurrent_sessions: usize,
    /// Hard ceiling after which the watchdog tears a session down
    pub session_hard_timeout_secs: u64,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Directory holding browser profiles (defaults to the cache dir)
    pub profile_root: Option<PathBuf>,
    /// Name of a persistent profile to reuse; ephemeral profiles when unset
    pub persistent_profile: Option<String>,
    /// Explicit Chrome/Chromium executable
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            max_concurrent_sessions: 8,
            session_hard_timeout_secs: 200,
            navigation_timeout_secs: 30,
            profile_root: None,
            persistent_profile: None,
            chrome_executable: None,
        }
    }
}

/// Query execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckingConfig {
    /// Per-provider logical timeout when the request omits one
    pub default_timeout_ms: u64,
    /// Requests asking for more than this are clamped
    pub max_timeout_ms: u64,
    /// Interval between idle heartbeats on event streams
    pub heartbeat_interval_secs: u64,
    /// Overwrite cached timeouts with results that arrive late
    pub backfill_late_results: bool,
    /// Abort outstanding checks when a stream consumer goes away
    pub cancel_on_disconnect: bool,
}

impl Default for CheckingConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_timeout_ms: 120_000,
            heartbeat_interval_secs: 15,
            backfill_late_results: true,
            cancel_on_disconnect: false,
        }
    }
}

/// Where a store keeps its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map, lost on exit
    Memory,
    /// `SQLite` database at `storage.database_path`
    Sqlite,
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache store backend
    pub backend: StoreBackend,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Job queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Job store backend
    pub backend: StoreBackend,
    /// Number of concurrent queue workers
    pub worker_concurrency: usize,
    /// Attempts per job before it is marked failed
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub backoff_base_ms: u64,
    /// How long finished jobs stay inspectable
    pub retention_secs: u64,
    /// Interval of the pruning task
    pub prune_interval_secs: u64,
    /// Idle workers re-check the store at this interval
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            worker_concurrency: 2,
            max_attempts: 2,
            backoff_base_ms: 5_000,
            retention_secs: 60 * 60,
            prune_interval_secs: 5 * 60,
            poll_interval_ms: 500,
        }
    }
}

/// On-disk storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database file (defaults to `<data_dir>/regscout.db`)
    pub database_path: Option<PathBuf>,
}

/// One configured provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which provider this entry describes
    pub id: ProviderId,
    /// Disabled providers are not registered
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How to query the provider
    #[serde(flatten)]
    pub source: ProviderSource,
}

fn default_true() -> bool {
    true
}

/// How a provider is queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProviderSource {
    /// JSON API reached with a plain HTTP GET
    HttpJson(HttpJsonSource),
    /// Web page rendered in a browser session
    BrowserPage(BrowserPageSource),
}

impl ProviderSource {
    /// URL template of either source kind.
    #[must_use]
    pub fn url_template(&self) -> &str {
        match self {
            Self::HttpJson(source) => &source.url_template,
            Self::BrowserPage(source) => &source.url_template,
        }
    }
}

/// JSON API source. Pointers use RFC 6901 syntax (`/data/price`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpJsonSource {
    /// URL with `{domain}`, `{sld}` and `{tld}` placeholders
    pub url_template: String,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Pointer to the availability value
    pub available_pointer: Option<String>,
    /// String values (case-insensitive) that mean "available"
    pub available_values: Vec<String>,
    /// Pointer to the premium flag
    pub premium_pointer: Option<String>,
    /// Pointer to the registration price
    pub registration_price_pointer: Option<String>,
    /// Pointer to the renewal price
    pub renewal_price_pointer: Option<String>,
    /// Pointer to the currency code
    pub currency_pointer: Option<String>,
    /// Fixed currency code when the API does not report one
    pub currency: Option<String>,
}

/// Browser page source. Patterns are regular expressions matched against
/// the extracted page text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserPageSource {
    /// URL with `{domain}`, `{sld}` and `{tld}` placeholders
    pub url_template: String,
    /// Selector to wait for before reading the page
    pub ready_selector: Option<String>,
    /// Selector whose text is classified
    pub text_selector: String,
    /// Patterns meaning "available"
    pub available_patterns: Vec<String>,
    /// Patterns meaning "taken"; checked before the available patterns
    pub unavailable_patterns: Vec<String>,
    /// Patterns meaning "premium"
    pub premium_patterns: Vec<String>,
    /// Pattern whose first capture group is the registration price
    pub registration_price_pattern: Option<String>,
    /// Pattern whose first capture group is the renewal price
    pub renewal_price_pattern: Option<String>,
    /// Currency of the extracted prices
    pub currency: Option<String>,
}

impl Default for BrowserPageSource {
    fn default() -> Self {
        Self {
            url_template: String::new(),
            ready_selector: None,
            text_selector: "body".to_string(),
            available_patterns: Vec::new(),
            unavailable_patterns: Vec::new(),
            premium_patterns: Vec::new(),
            registration_price_pattern: None,
            renewal_price_pattern: None,
            currency: None,
        }
    }
}
