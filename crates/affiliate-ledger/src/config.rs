//! Configuration for the affiliate ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::policy::CommissionPolicy;

/// Main ledger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Commission rates, thresholds and payout minimum
    #[serde(default)]
    pub policy: CommissionPolicy,

    /// Payout channel settings
    #[serde(default)]
    pub payout: PayoutConfig,

    /// Account store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Payout workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Upper bound on a single payout-channel call; on expiry the payout is
    /// left in flight
    #[serde(default = "default_channel_timeout")]
    pub channel_timeout_ms: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            channel_timeout_ms: default_channel_timeout(),
        }
    }
}

impl PayoutConfig {
    pub fn channel_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_timeout_ms)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// One JSON document per account under a directory
    File {
        /// Data directory
        path: PathBuf,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_channel_timeout() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LedgerConfig {
    /// Load configuration: defaults, then an optional file, then
    /// `AFFILIATE__`-style environment variables (e.g.
    /// `AFFILIATE_PAYOUT__CHANNEL_TIMEOUT_MS=5000`).
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        builder = builder.add_source(::config::Config::try_from(&LedgerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("AFFILIATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
