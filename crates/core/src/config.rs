use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    pub rate_limit: RateLimitConfig,
    pub oracle: OracleConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Address of the option contract.
    pub contract_address: String,
    /// Hex private key of the settlement signer. Without one the gateway is
    /// read-only.
    pub private_key: Option<String>,
    pub request_timeout_secs: u64,
    pub receipt_poll_secs: u64,
    pub receipt_timeout_secs: u64,
    pub gas_limit: u64,
    pub amount_decimals: u32,
    pub price_decimals: u32,
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("contract_address", &self.contract_address)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("receipt_poll_secs", &self.receipt_poll_secs)
            .field("receipt_timeout_secs", &self.receipt_timeout_secs)
            .field("gas_limit", &self.gas_limit)
            .field("amount_decimals", &self.amount_decimals)
            .field("price_decimals", &self.price_decimals)
            .finish()
    }
}

/// Shared budget for every RPC call made by the gateway and the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl RateLimitConfig {
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub max_staleness_secs: u64,
    /// Feed per asset symbol (uppercase).
    pub feeds: HashMap<String, FeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub address: String,
    #[serde(default = "default_feed_decimals")]
    pub decimals: u32,
}

const fn default_feed_decimals() -> u32 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub scan_interval_secs: u64,
    pub resolve_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/binopt".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 137,
            contract_address: String::new(),
            private_key: None,
            request_timeout_secs: 30,
            receipt_poll_secs: 2,
            receipt_timeout_secs: 120,
            gas_limit: 300_000,
            amount_decimals: 18,
            price_decimals: 8,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1_000,
            max_retries: 3,
            base_delay_ms: 2_000,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_staleness_secs: 3_600,
            feeds: HashMap::new(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            resolve_interval_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration `{field}`: {reason}")]
pub struct ConfigError {
    pub field: String,
    pub reason: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl AppConfig {
    /// Checks values serde cannot.
    ///
    /// # Errors
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.rpc_url.trim().is_empty() {
            return Err(ConfigError::new("chain.rpc_url", "must not be empty"));
        }
        if !is_hex_address(&self.chain.contract_address) {
            return Err(ConfigError::new(
                "chain.contract_address",
                "must be a 0x-prefixed 20-byte hex address",
            ));
        }
        for (field, value) in [
            ("chain.request_timeout_secs", self.chain.request_timeout_secs),
            ("chain.receipt_poll_secs", self.chain.receipt_poll_secs),
            ("chain.receipt_timeout_secs", self.chain.receipt_timeout_secs),
            ("rate_limit.min_interval_ms", self.rate_limit.min_interval_ms),
            ("scheduler.scan_interval_secs", self.scheduler.scan_interval_secs),
            (
                "scheduler.resolve_interval_secs",
                self.scheduler.resolve_interval_secs,
            ),
        ] {
            if value == 0 {
                return Err(ConfigError::new(field, "must be greater than zero"));
            }
        }
        for (asset, feed) in &self.oracle.feeds {
            if !is_hex_address(&feed.address) {
                return Err(ConfigError::new(
                    format!("oracle.feeds.{asset}.address"),
                    "must be a 0x-prefixed 20-byte hex address",
                ));
            }
        }
        Ok(())
    }
}

fn is_hex_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
