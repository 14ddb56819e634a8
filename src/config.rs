use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::client::{GasParams, QuoteSource};
use crate::error::ConfigError;

/// What to do when the registration read itself fails.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRegistrationPolicy {
    /// Treat as "not registered" and submit a registration.
    /// May send a duplicate registration if the node is in fact registered.
    #[default]
    Register,
    /// Stop before sending any transaction.
    Abort,
}

/// Private key material. Never serialized, redacted in `Debug`.
#[derive(Clone, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct OracleConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub quote: QuoteConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub private_key: Option<Secret>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct NodeConfig {
    pub log_level: String,
    pub interval_secs: u64,
    pub on_unknown_registration: UnknownRegistrationPolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            interval_secs: 5,
            on_unknown_registration: UnknownRegistrationPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// NodeManager contract address
    pub contract_address: Option<String>,
    pub gas_limit: u64,
    pub gas_price_gwei: u64,
    pub request_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let gas = GasParams::default();
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: None,
            gas_limit: gas.gas_limit,
            gas_price_gwei: (gas.gas_price_wei / 1_000_000_000) as u64,
            request_timeout_secs: 10,
            confirmation_timeout_secs: 120,
            receipt_poll_interval_ms: 1_000,
        }
    }
}

impl LedgerConfig {
    pub fn gas_params(&self) -> GasParams {
        GasParams {
            gas_limit: self.gas_limit,
            gas_price_wei: self.gas_price_gwei as u128 * 1_000_000_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct QuoteConfig {
    pub url: String,
    pub base: String,
    pub currency: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            url: "https://min-api.cryptocompare.com/data/price".to_string(),
            base: "BTC".to_string(),
            currency: "USD".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl QuoteConfig {
    pub fn source(&self) -> QuoteSource {
        QuoteSource {
            url: self.url.clone(),
            base: self.base.clone(),
            currency: self.currency.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PublishConfig {
    pub url: String,
    /// Bound on the WebSocket handshake, initial connect and reconnects alike
    pub connect_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl OracleConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads `path` if it exists; a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("Config file not found at '{}'. Using defaults.", path.display());
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&s)
    }

    /// Overlays values from environment variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("PRIVATE_KEY").filter(|k| !k.trim().is_empty()) {
            self.private_key = Some(Secret::new(key));
        }
        if let Some(url) = lookup("RPC_URL") {
            self.ledger.rpc_url = url;
        }
        if let Some(addr) = lookup("NODE_MANAGER_CONTRACT") {
            self.ledger.contract_address = Some(addr);
        }
        if let Some(key) = lookup("QUOTE_API_KEY") {
            self.quote.api_key = Some(key);
        }
        if let Some(url) = lookup("QUOTE_URL") {
            self.quote.url = url;
        }
        if let Some(url) = lookup("PUBLISH_URL") {
            self.publish.url = url;
        }
        if let Some(secs) = lookup("ORACLE_INTERVAL_SECS") {
            self.node.interval_secs = secs.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "ORACLE_INTERVAL_SECS",
                reason: format!("'{}' is not a number", secs),
            })?;
        }
        Ok(())
    }

    /// Checks everything needed before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.private_key.is_none() {
            return Err(ConfigError::MissingPrivateKey);
        }
        if self.node.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "node.interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.ledger.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "ledger.rpc_url",
                reason: "must not be empty".to_string(),
            });
        }
        self.contract_address()?;
        Ok(())
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        let raw = self
            .ledger
            .contract_address
            .as_deref()
            .ok_or(ConfigError::Invalid {
                field: "ledger.contract_address",
                reason: "NODE_MANAGER_CONTRACT is not set".to_string(),
            })?;
        raw.trim().parse::<Address>().map_err(|e| ConfigError::Invalid {
            field: "ledger.contract_address",
            reason: format!("'{}': {}", raw, e),
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.node.interval_secs)
    }

    pub fn symbol(&self) -> String {
        format!("{}{}", self.quote.base, self.quote.currency)
    }
}
