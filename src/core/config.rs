use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const MIN_CHART_INTERVAL_SECS: u64 = 1;
pub const MAX_CHART_INTERVAL_SECS: u64 = 60;

fn default_symbols() -> Vec<String> {
    vec!["BTC".to_string(), "ETH".to_string()]
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RefreshConfig {
    #[serde(default = "RefreshConfig::default_chart_interval")]
    pub chart_interval_secs: u64,
    #[serde(default = "RefreshConfig::default_price_interval")]
    pub price_interval_secs: u64,
    #[serde(default = "RefreshConfig::default_portfolio_interval")]
    pub portfolio_interval_secs: u64,
    #[serde(default = "RefreshConfig::default_lookback")]
    pub lookback_minutes: i64,
}

impl RefreshConfig {
    fn default_chart_interval() -> u64 {
        5
    }

    fn default_price_interval() -> u64 {
        60
    }

    fn default_portfolio_interval() -> u64 {
        15 * 60
    }

    fn default_lookback() -> i64 {
        30
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            chart_interval_secs: Self::default_chart_interval(),
            price_interval_secs: Self::default_price_interval(),
            portfolio_interval_secs: Self::default_portfolio_interval(),
            lookback_minutes: Self::default_lookback(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TablesConfig {
    #[serde(default = "TablesConfig::default_current_prices")]
    pub current_prices: String,
    #[serde(default = "TablesConfig::default_portfolio")]
    pub portfolio: String,
    #[serde(default = "TablesConfig::default_news")]
    pub news: String,
}

impl TablesConfig {
    fn default_current_prices() -> String {
        "CURRENT_PRICE_VIEW".to_string()
    }

    fn default_portfolio() -> String {
        "PORTFOLIO".to_string()
    }

    fn default_news() -> String {
        "CRYPTO_NEWS".to_string()
    }
}

impl Default for TablesConfig {
    fn default() -> Self {
        TablesConfig {
            current_prices: Self::default_current_prices(),
            portfolio: Self::default_portfolio(),
            news: Self::default_news(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WarehouseConfig {
    pub base_url: String,
    pub database: String,
    pub schema: String,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    #[serde(default = "WarehouseConfig::default_token_env")]
    pub token_env: String,
    pub token_type: Option<String>,
    #[serde(default = "WarehouseConfig::default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub tables: TablesConfig,
}

impl WarehouseConfig {
    fn default_token_env() -> String {
        "SNOWFLAKE_TOKEN".to_string()
    }

    fn default_timeout() -> u64 {
        60
    }

    /// Fully qualified name of a table or view in the configured schema.
    pub fn qualify(&self, object: &str) -> String {
        format!("{}.{}.{}", self.database, self.schema, object)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NewsConfig {
    #[serde(default = "NewsConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "NewsConfig::default_category")]
    pub category: String,
    #[serde(default = "NewsConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "NewsConfig::default_headline_limit")]
    pub headline_limit: i64,
}

impl NewsConfig {
    fn default_base_url() -> String {
        "https://finnhub.io/api/v1".to_string()
    }

    fn default_category() -> String {
        "crypto".to_string()
    }

    fn default_api_key_env() -> String {
        "FINNHUB_API_KEY".to_string()
    }

    fn default_headline_limit() -> i64 {
        10
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        NewsConfig {
            base_url: Self::default_base_url(),
            category: Self::default_category(),
            api_key_env: Self::default_api_key_env(),
            headline_limit: Self::default_headline_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_bucket")]
    pub bucket: String,
    pub data_path: Option<String>,
}

impl StorageConfig {
    fn default_bucket() -> String {
        "import-finnhub".to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            bucket: Self::default_bucket(),
            data_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "cryptodash", "cryptodash")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.storage.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "cryptodash", "cryptodash")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let interval = self.refresh.chart_interval_secs;
        if !(MIN_CHART_INTERVAL_SECS..=MAX_CHART_INTERVAL_SECS).contains(&interval) {
            bail!(
                "chart_interval_secs must be between {MIN_CHART_INTERVAL_SECS} and {MAX_CHART_INTERVAL_SECS}, got {interval}"
            );
        }
        if self.symbols.is_empty() {
            bail!("At least one symbol must be configured");
        }
        if let Some(symbol) = self.symbols.iter().find(|s| !is_valid_symbol(s)) {
            bail!("Invalid symbol {symbol:?}: only ASCII letters and digits are allowed");
        }
        Ok(())
    }
}

/// Symbols end up in view names, so they are restricted to identifiers.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
symbols: [BTC, ETH, SOL]
refresh:
  chart_interval_secs: 10
warehouse:
  base_url: "https://acme.snowflakecomputing.com"
  database: MSK_STREAMING_DB
  schema: MSK_STREAMING_SCHEMA
  warehouse: COMPUTE_WH
  tables:
    portfolio: MY_PORTFOLIO
news:
  category: general
storage:
  bucket: news-archive
  data_path: /tmp/cryptodash
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.symbols, vec!["BTC", "ETH", "SOL"]);
        assert_eq!(config.refresh.chart_interval_secs, 10);
        assert_eq!(config.refresh.price_interval_secs, 60);
        assert_eq!(config.refresh.portfolio_interval_secs, 900);
        assert_eq!(config.refresh.lookback_minutes, 30);

        assert_eq!(config.warehouse.warehouse.as_deref(), Some("COMPUTE_WH"));
        assert_eq!(config.warehouse.token_env, "SNOWFLAKE_TOKEN");
        assert_eq!(config.warehouse.timeout_secs, 60);
        assert_eq!(config.warehouse.tables.portfolio, "MY_PORTFOLIO");
        assert_eq!(config.warehouse.tables.current_prices, "CURRENT_PRICE_VIEW");
        assert_eq!(
            config.warehouse.qualify("BTC_TRADING_VIEW"),
            "MSK_STREAMING_DB.MSK_STREAMING_SCHEMA.BTC_TRADING_VIEW"
        );

        assert_eq!(config.news.category, "general");
        assert_eq!(config.news.base_url, "https://finnhub.io/api/v1");
        assert_eq!(config.news.api_key_env, "FINNHUB_API_KEY");
        assert_eq!(config.storage.bucket, "news-archive");
        assert_eq!(
            config.data_path().unwrap(),
            PathBuf::from("/tmp/cryptodash")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let yaml_str = r#"
warehouse:
  base_url: "http://localhost"
  database: DB
  schema: PUBLIC
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.symbols, vec!["BTC", "ETH"]);
        assert_eq!(config.refresh, RefreshConfig::default());
        assert_eq!(config.news, NewsConfig::default());
        assert_eq!(config.storage.bucket, "import-finnhub");
        assert!(config.storage.data_path.is_none());
    }

    #[test]
    fn test_config_validation() {
        let yaml_str = r#"
warehouse:
  base_url: "http://localhost"
  database: DB
  schema: PUBLIC
"#;
        let mut config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();

        config.refresh.chart_interval_secs = 0;
        assert!(config.validate().is_err());
        config.refresh.chart_interval_secs = 61;
        assert!(config.validate().is_err());
        config.refresh.chart_interval_secs = 60;
        assert!(config.validate().is_ok());

        config.symbols = vec!["BTC; DROP TABLE X".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid symbol"));

        config.symbols.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_valid_symbol() {
        assert!(is_valid_symbol("BTC"));
        assert!(is_valid_symbol("1INCH"));
        assert!(!is_valid_symbol(""));
        assert!(!is_valid_symbol("BTC-USD"));
    }
}
