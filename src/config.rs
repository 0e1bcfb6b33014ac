use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use url::Url;

use crate::models::Site;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub search: SearchConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchEngine {
    /// Render pages in headless Chrome.
    Chrome,
    /// Plain HTTP GET; no JavaScript.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub engine: FetchEngine,
    pub browser_pool_size: usize,
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: String,
    pub navigation_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Search result pages walked per source.
    pub max_pages: u32,
    /// Scroll passes after load, to trigger lazy images.
    pub scroll_steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_max_products: usize,
    pub max_products_limit: usize,
    pub source_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub site: Site,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides the store's public URL (mirrors, fixtures).
    pub base_url: Option<String>,
    /// Overrides `search.source_timeout_ms` for this source.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Run an alert matching pass after every successful search.
    pub match_on_search: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// When set, logs are also written to a daily rolling file here.
    pub directory: Option<String>,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_log_prefix() -> String {
    "dealscope.log".to_string()
}

fn default_sources() -> Vec<SourceConfig> {
    Site::ALL.iter().map(|site| SourceConfig::new(*site)).collect()
}

impl SourceConfig {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            enabled: true,
            base_url: None,
            timeout_ms: None,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.site.default_base_url())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            scraper: ScraperConfig::default(),
            search: SearchConfig::default(),
            sources: default_sources(),
            alerts: AlertsConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/dealscope.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: 30,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            engine: FetchEngine::Chrome,
            browser_pool_size: 2,
            headless: true,
            chrome_path: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            navigation_timeout_ms: 25_000,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            max_pages: 2,
            scroll_steps: 6,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_products: 12,
            max_products_limit: 60,
            source_timeout_ms: 45_000,
            request_timeout_ms: 90_000,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { match_on_search: true }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, port: 9001 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_log_prefix(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "DEALSCOPE_"
            .add_source(Environment::with_prefix("DEALSCOPE").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Enabled sources in priority order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server configuration
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        // Validate database configuration
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        // Validate scraper configuration
        if self.scraper.browser_pool_size == 0 {
            return Err(ConfigError::Message("Scraper browser_pool_size must be greater than 0".into()));
        }

        if self.scraper.retry_attempts == 0 {
            return Err(ConfigError::Message("Scraper retry_attempts must be at least 1".into()));
        }

        if self.scraper.max_pages == 0 {
            return Err(ConfigError::Message("Scraper max_pages must be at least 1".into()));
        }

        // Validate search configuration
        if self.search.default_max_products == 0
            || self.search.default_max_products > self.search.max_products_limit
        {
            return Err(ConfigError::Message(
                "Search default_max_products must be between 1 and max_products_limit".into(),
            ));
        }

        if self.search.source_timeout_ms == 0 || self.search.request_timeout_ms == 0 {
            return Err(ConfigError::Message("Search timeouts must be greater than 0".into()));
        }

        if self.search.source_timeout_ms > self.search.request_timeout_ms {
            return Err(ConfigError::Message(
                "Search source_timeout_ms cannot exceed request_timeout_ms".into(),
            ));
        }

        // Validate sources
        if self.enabled_sources().next().is_none() {
            return Err(ConfigError::Message("At least one source must be enabled".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.site) {
                return Err(ConfigError::Message(format!("Source {} is configured twice", source.site)));
            }
            if Url::parse(source.base_url()).is_err() {
                return Err(ConfigError::Message(format!("Invalid base URL for source {}", source.site)));
            }
        }

        // Validate metrics configuration
        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
            }
            if self.metrics.port == self.server.port {
                return Err(ConfigError::Message("Metrics port must differ from server port".into()));
            }
        }

        Ok(())
    }
}
