use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurrencyConfig {
    /// Currency the security's closes are quoted in.
    pub local: String,
    /// Currency everything is normalized into.
    pub reference: String,
    /// Symbol whose daily closes quote local units per one reference unit.
    pub exchange_symbol: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        CurrencyConfig {
            local: "KRW".to_string(),
            reference: "USD".to_string(),
            exchange_symbol: "KRW=X".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommodityConfig {
    pub symbol: String,
}

/// Declared quote currency of the benchmark. An explicit input, never
/// inferred from the symbol.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkCurrency {
    #[default]
    Local,
    Reference,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BenchmarkConfig {
    pub symbol: String,
    #[serde(default)]
    pub currency: BenchmarkCurrency,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FredProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_price_level_series")]
    pub series_id: String,
}

impl Default for FredProviderConfig {
    fn default() -> Self {
        FredProviderConfig {
            base_url: "https://api.stlouisfed.org".to_string(),
            api_key: None,
            series_id: default_price_level_series(),
        }
    }
}

fn default_price_level_series() -> String {
    "CPIAUCSL".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DirectoryProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub fred: Option<FredProviderConfig>,
    pub directory: Option<DirectoryProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            fred: Some(FredProviderConfig::default()),
            directory: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub commodity: Option<CommodityConfig>,
    #[serde(default)]
    pub benchmark: Option<BenchmarkConfig>,
    /// Deadline in seconds for each optional series fetch before it
    /// degrades to an empty series.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Exchange suffix appended to bare numeric ticker codes.
    #[serde(default = "default_symbol_suffix")]
    pub symbol_suffix: String,
}

fn default_fetch_timeout_secs() -> u64 {
    8
}

fn default_symbol_suffix() -> String {
    ".KS".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "realfx", "realfx")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
