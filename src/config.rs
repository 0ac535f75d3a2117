use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::arrivals::DEFAULT_LIMIT;
use crate::fetch::RetryPolicy;
use crate::freshness::{DatasetClass, FreshnessPolicy, FreshnessTable};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// IANA zone used to render clock-time ETA labels
    pub timezone: String,
    /// Allowed CORS origins. Required unless cors_permissive is true.
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    pub cors_permissive: bool,
    /// Load the demo stops, routes and arrivals into the store at startup
    pub seed_demo_data: bool,
    pub source: SourceConfig,
    pub freshness: FreshnessConfig,
    pub retry: RetryConfig,
    pub board: BoardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            timezone: "Australia/Sydney".to_string(),
            cors_origins: Vec::new(),
            cors_permissive: false,
            seed_demo_data: true,
            source: SourceConfig::default(),
            freshness: FreshnessConfig::default(),
            retry: RetryConfig::default(),
            board: BoardConfig::default(),
        }
    }
}

/// Where the live cache reads its datasets from
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Read straight from the in-process store
    #[default]
    Local,
    /// Read from another instance's REST API
    Remote {
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default)]
        api_key: Option<String>,
    },
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PolicyConfig {
    pub stale_after_secs: u64,
    #[serde(default)]
    pub refetch_interval_secs: Option<u64>,
}

impl From<PolicyConfig> for FreshnessPolicy {
    fn from(value: PolicyConfig) -> Self {
        FreshnessPolicy {
            stale_after: Duration::from_secs(value.stale_after_secs),
            refetch_interval: value
                .refetch_interval_secs
                .map(|secs| Duration::from_secs(secs.max(1))),
        }
    }
}

/// Per-class overrides of the built-in freshness table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    pub vehicles: Option<PolicyConfig>,
    pub arrivals: Option<PolicyConfig>,
    pub alerts: Option<PolicyConfig>,
    pub reference: Option<PolicyConfig>,
}

impl FreshnessConfig {
    pub fn table(&self) -> FreshnessTable {
        let mut table = FreshnessTable::default();
        let overrides = [
            (DatasetClass::Vehicles, self.vehicles),
            (DatasetClass::Arrivals, self.arrivals),
            (DatasetClass::Alerts, self.alerts),
            (DatasetClass::Reference, self.reference),
        ];
        for (class, policy) in overrides {
            if let Some(policy) = policy {
                table.set(class, policy.into());
            }
        }
        table
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts for the arrivals dataset
    pub arrivals: u32,
    /// Additional attempts for every other dataset
    pub default: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            arrivals: 2,
            default: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn policy_for(&self, class: DatasetClass) -> RetryPolicy {
        let retries = match class {
            DatasetClass::Arrivals => self.arrivals,
            _ => self.default,
        };
        RetryPolicy {
            retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub default_limit: usize,
    /// How often an open board socket re-renders ETA labels without new data
    pub render_interval_secs: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            render_interval_secs: 15,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.tz()?;
        Ok(config)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Unknown time zone: {0}")]
    InvalidTimezone(String),
}
