//! Configuration file support for tabsync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `TABSYNC_`, `__` between section
//!    and key, e.g. `TABSYNC_STORE__API_KEY`)
//! 3. Config file (./tabsync.toml, then ~/.config/tabsync/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [store]
//! api_key = "pat..."       # or use TABSYNC_STORE__API_KEY
//! base_id = "app123"
//! api_url = "https://api.airtable.com/v0"
//! request_delay_ms = 250
//! timeout_secs = 30
//! requests_per_second = 5  # proactive limiter, 0 disables it
//! typecast = false
//!
//! [fetch]
//! retry_cooldown_secs = 30
//! max_attempts = 2000
//!
//! [poll]
//! interval_secs = 60
//! ```
//!
//! A file that fails to parse, or values that would leave requests
//! unthrottled, are reported as errors rather than replaced by defaults.

use std::path::PathBuf;
use std::time::Duration;

use config::builder::{ConfigBuilder as SourceBuilder, DefaultState};
use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use tabsync::rate_limit::{ApiRateLimiter, rate_limits};
use tabsync::types::{
    DEFAULT_API_URL, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_DELAY_MS, FETCH_RETRY_COOLDOWN_MS,
    MAX_FETCH_ATTEMPTS,
};
use tabsync::{ClientOptions, RetryConfig};

/// Default HTTP timeout for CLI requests.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store connection settings.
    pub store: StoreConfig,
    /// Fetch-all retry settings.
    pub fetch: FetchConfig,
    /// Poll loop settings.
    pub poll: PollSettings,
}

/// Store connection settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// API key. Can also be set via TABSYNC_STORE__API_KEY.
    pub api_key: Option<String>,
    /// Default base id, overridable per command with `--base`.
    pub base_id: Option<String>,
    pub api_url: String,
    /// Pause between requests of one operation. Zero is allowed only while
    /// the proactive limiter is on.
    pub request_delay_ms: u64,
    /// Overall HTTP timeout. Zero disables it.
    pub timeout_secs: u64,
    /// Proactive rate limit. Zero disables the limiter.
    pub requests_per_second: u32,
    /// Let the store coerce string values on write.
    pub typecast: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_id: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            requests_per_second: rate_limits::STORE_DEFAULT_RPS,
            typecast: false,
        }
    }
}

/// Fetch-all retry settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub retry_cooldown_secs: u64,
    pub max_attempts: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_cooldown_secs: FETCH_RETRY_COOLDOWN_MS / 1000,
            max_attempts: MAX_FETCH_ATTEMPTS,
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Must be at least one.
    pub interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_MS / 1000,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/tabsync/config.toml)
    /// 3. Local config file (./tabsync.toml)
    /// 4. Environment variables with TABSYNC_ prefix
    ///
    /// Parse errors and invalid values are returned, never masked by defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("tabsync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./tabsync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // TABSYNC_STORE__API_KEY -> store.api_key
        builder = builder.add_source(Self::environment());

        Self::from_sources(builder)
    }

    fn from_sources(builder: SourceBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would poll or request without any pause.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::Message(
                "[poll] interval_secs must be at least 1".to_string(),
            ));
        }
        if self.store.request_delay_ms == 0 && self.store.requests_per_second == 0 {
            return Err(ConfigError::Message(
                "[store] request_delay_ms and requests_per_second are both 0; \
                 set at least one so requests stay paced"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn environment() -> Environment {
        Environment::with_prefix("TABSYNC")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tabsync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// The API key, or an error explaining where to set it.
    pub fn api_key(&self) -> Result<&str, String> {
        self.store
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                "No API key configured. Set TABSYNC_STORE__API_KEY or [store] api_key in \
                 tabsync.toml"
                    .to_string()
            })
    }

    /// Resolve the base id from a CLI flag or the config.
    pub fn base_id(&self, flag: Option<&str>) -> Result<String, String> {
        flag.map(str::to_string)
            .or_else(|| self.store.base_id.clone())
            .ok_or_else(|| {
                "No base id given. Pass --base or set [store] base_id".to_string()
            })
    }

    pub fn client_options(&self) -> ClientOptions {
        let timeout = (self.store.timeout_secs > 0)
            .then(|| Duration::from_secs(self.store.timeout_secs));

        ClientOptions {
            api_url: self.store.api_url.clone(),
            request_delay: Duration::from_millis(self.store.request_delay_ms),
            timeout,
            typecast: self.store.typecast,
            rate_limiter: (self.store.requests_per_second > 0)
                .then(|| ApiRateLimiter::new(self.store.requests_per_second)),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_secs(self.fetch.retry_cooldown_secs),
            self.fetch.max_attempts,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }
}
