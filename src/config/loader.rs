//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching dashboard.toml structure.
//! Every section has defaults, so an empty file (or no file) is a working setup
//! apart from API keys.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::adapters::http::{FetcherConfig, RatePolicy};
use crate::ports::Provider;
use crate::adapters::market_data::{
    ALPHA_VANTAGE_URL, COINGECKO_MARKETS_URL, DEFAULT_SCRAPER_URL, FEAR_GREED_URL,
    FMP_ACTIVES_URL, FRANKFURTER_URL,
};

/// Default config location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard.toml";

/// Values shipped in sample files that must never reach a provider
const PLACEHOLDER_KEYS: [&str; 4] = [
    "YOUR_ALPHA_VANTAGE_API_KEY",
    "YOUR_FMP_API_KEY",
    "YOUR_API_KEY",
    "changeme",
];

/// Main configuration structure matching dashboard.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersSection,
    pub equities: EquitiesSection,
    pub movers: MoversSection,
    pub schedule: ScheduleSection,
    pub proxy: ProxySection,
    pub logging: LoggingSection,
}

/// Provider endpoints, keys and pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub coingecko_url: String,
    /// Listing size for the crypto table
    pub crypto_table_size: u32,
    /// Listing size for the crypto converter
    pub converter_listing_size: u32,
    /// Listing pages fetched per converter refresh
    pub converter_pages: u32,
    /// Equity quote endpoint. Point it at the proxy to keep the key server-side.
    pub alpha_vantage_url: String,
    pub alpha_vantage_api_key: Option<String>,
    /// Minimum seconds between two equity requests
    pub alpha_vantage_spacing_secs: u64,
    /// Free tier quota
    pub alpha_vantage_per_minute: u32,
    pub fear_greed_url: String,
    pub frankfurter_url: String,
    pub fmp_url: String,
    pub fmp_api_key: Option<String>,
    /// HTTP request timeout
    pub timeout_secs: u64,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            coingecko_url: COINGECKO_MARKETS_URL.to_string(),
            crypto_table_size: 15,
            converter_listing_size: 100,
            converter_pages: 2,
            alpha_vantage_url: ALPHA_VANTAGE_URL.to_string(),
            alpha_vantage_api_key: None,
            alpha_vantage_spacing_secs: 15,
            alpha_vantage_per_minute: 5,
            fear_greed_url: FEAR_GREED_URL.to_string(),
            frankfurter_url: FRANKFURTER_URL.to_string(),
            fmp_url: FMP_ACTIVES_URL.to_string(),
            fmp_api_key: None,
            timeout_secs: 20,
        }
    }
}

impl ProvidersSection {
    /// Get API key with environment variable fallback
    /// Checks ALPHA_VANTAGE_API_KEY env var if config value is empty/None
    pub fn get_alpha_vantage_key(&self) -> Option<String> {
        self.alpha_vantage_key_from(env_var)
    }

    /// Checks FMP_API_KEY env var if config value is empty/None
    pub fn get_fmp_key(&self) -> Option<String> {
        self.fmp_key_from(env_var)
    }

    fn alpha_vantage_key_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        key_or_lookup(&self.alpha_vantage_api_key, "ALPHA_VANTAGE_API_KEY", lookup)
    }

    fn fmp_key_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        key_or_lookup(&self.fmp_api_key, "FMP_API_KEY", lookup)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_var(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

fn key_or_lookup(
    configured: &Option<String>,
    var: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(key) = configured {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }
    lookup(var)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

fn is_placeholder(key: &str) -> bool {
    PLACEHOLDER_KEYS.iter().any(|p| p.eq_ignore_ascii_case(key.trim()))
}

// Conversion from the providers section to the fetcher's pacing setup
impl From<&ProvidersSection> for FetcherConfig {
    fn from(providers: &ProvidersSection) -> Self {
        let equity_policy = RatePolicy {
            min_spacing: Duration::from_secs(providers.alpha_vantage_spacing_secs),
            max_per_window: Some(providers.alpha_vantage_per_minute),
        };

        FetcherConfig {
            timeout: providers.timeout(),
            ..FetcherConfig::default()
        }
        .with_policy(Provider::AlphaVantage, equity_policy)
    }
}

/// Equity table symbols and display names
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EquitiesSection {
    pub symbols: Vec<String>,
    /// Ticker to company name
    pub names: HashMap<String, String>,
}

impl Default for EquitiesSection {
    fn default() -> Self {
        let names = [
            ("AAPL", "Apple Inc."),
            ("MSFT", "Microsoft Corp."),
            ("GOOGL", "Alphabet Inc."),
            ("AMZN", "Amazon.com, Inc."),
            ("NVDA", "NVIDIA Corp."),
            ("META", "Meta Platforms, Inc."),
            ("TSLA", "Tesla, Inc."),
            ("JPM", "JPMorgan Chase & Co."),
        ];
        Self {
            symbols: names.iter().map(|(symbol, _)| symbol.to_string()).collect(),
            names: names
                .iter()
                .map(|(symbol, name)| (symbol.to_string(), name.to_string()))
                .collect(),
        }
    }
}

/// Market movers sources
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoversSection {
    /// LLM scraping endpoint
    pub scraper_url: String,
    /// Merge in the most-actives list when an FMP key is available
    pub use_fmp: bool,
    /// Rows taken from the crypto listing when the scraper fails
    pub fallback_limit: usize,
}

impl Default for MoversSection {
    fn default() -> Self {
        Self {
            scraper_url: DEFAULT_SCRAPER_URL.to_string(),
            use_fmp: true,
            fallback_limit: 10,
        }
    }
}

/// Refresh intervals in seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub crypto_secs: u64,
    pub equities_secs: u64,
    pub movers_secs: u64,
    pub sentiment_secs: u64,
    pub converter_secs: u64,
    /// Wait after a failed pull before retrying. Unset means the full interval.
    pub retry_secs: Option<u64>,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            crypto_secs: 60,
            equities_secs: 300,
            movers_secs: 300,
            sentiment_secs: 600,
            converter_secs: 300,
            retry_secs: Some(30),
        }
    }
}

impl ScheduleSection {
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_secs.map(Duration::from_secs)
    }
}

/// Equity proxy server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySection {
    pub bind: String,
    /// Upstream the proxy forwards to
    pub upstream_url: String,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            upstream_url: ALPHA_VANTAGE_URL.to_string(),
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Expand a leading `~` in a config path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No config at {}, using defaults", path.display());
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate providers
        let urls = [
            ("coingecko_url", &self.providers.coingecko_url),
            ("alpha_vantage_url", &self.providers.alpha_vantage_url),
            ("fear_greed_url", &self.providers.fear_greed_url),
            ("frankfurter_url", &self.providers.frankfurter_url),
            ("fmp_url", &self.providers.fmp_url),
            ("scraper_url", &self.movers.scraper_url),
            ("upstream_url", &self.proxy.upstream_url),
        ];
        for (name, url) in urls {
            if url.trim().is_empty() {
                return Err(invalid(format!("{} cannot be empty", name)));
            }
        }

        if self.providers.crypto_table_size == 0 || self.providers.converter_listing_size == 0 {
            return Err(invalid("listing sizes must be > 0"));
        }

        if self.providers.converter_pages == 0 {
            return Err(invalid("converter_pages must be > 0"));
        }

        if self.providers.alpha_vantage_per_minute == 0 {
            return Err(invalid("alpha_vantage_per_minute must be > 0"));
        }

        if self.providers.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be > 0"));
        }

        for (name, key) in [
            ("alpha_vantage_api_key", &self.providers.alpha_vantage_api_key),
            ("fmp_api_key", &self.providers.fmp_api_key),
        ] {
            if let Some(key) = key {
                if is_placeholder(key) {
                    return Err(invalid(format!("{} is still the placeholder {:?}", name, key)));
                }
            }
        }

        // Validate equities
        if self.equities.symbols.is_empty() {
            return Err(invalid("equities.symbols cannot be empty"));
        }
        if self.equities.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("equities.symbols contains an empty symbol"));
        }

        // Validate schedule
        let intervals = [
            ("crypto_secs", self.schedule.crypto_secs),
            ("equities_secs", self.schedule.equities_secs),
            ("movers_secs", self.schedule.movers_secs),
            ("sentiment_secs", self.schedule.sentiment_secs),
            ("converter_secs", self.schedule.converter_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(invalid(format!("{} must be > 0", name)));
            }
        }
        if self.schedule.retry_secs == Some(0) {
            return Err(invalid("retry_secs must be > 0 when set"));
        }

        if self.movers.fallback_limit == 0 {
            return Err(invalid("fallback_limit must be > 0"));
        }

        if self.proxy.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(invalid(format!("proxy.bind {:?} is not an address", self.proxy.bind)));
        }

        Ok(())
    }

    /// Keys resolved from config or environment must not be placeholders either
    pub fn validate_keys(&self) -> Result<(), ConfigError> {
        self.validate_keys_from(env_var)
    }

    fn validate_keys_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        for key in [
            self.providers.alpha_vantage_key_from(&lookup),
            self.providers.fmp_key_from(&lookup),
        ]
        .into_iter()
            .flatten()
        {
            if is_placeholder(&key) {
                return Err(invalid(format!("placeholder API key {:?} in environment", key)));
            }
        }
        Ok(())
    }
}
