//! Configuration for the Relay trading agent

pub mod rpc;

use crate::tokens::{addresses, chains};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Re-export RPC config
pub use rpc::RpcConfig;

/// OpenServ platform API key environment variable name
pub const OPENSERV_API_KEY_ENV: &str = "OPENSERV_API_KEY";

/// OpenServ platform API URL override
pub const OPENSERV_API_URL_ENV: &str = "OPENSERV_API_URL";

/// Target chain parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Human-readable chain name
    pub name: String,
    /// EVM chain ID
    pub chain_id: u64,
    /// Chain tag used by DexScreener
    pub search_tag: String,
    /// Stablecoin contract address
    pub stable_address: String,
    /// Prefix a transaction hash is appended to
    pub explorer_tx_url: String,
    /// JSON-RPC endpoint; when unset the environment decides (Base only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

impl ChainConfig {
    pub fn explorer_url(&self, tx_hash: &str) -> String {
        format!("{}{}", self.explorer_tx_url, tx_hash)
    }

    /// On-chain address of an input currency
    pub fn currency_address(&self, currency: crate::tokens::InputCurrency) -> &str {
        match currency {
            crate::tokens::InputCurrency::Native => addresses::NATIVE,
            crate::tokens::InputCurrency::Stable => &self.stable_address,
        }
    }

    /// RPC endpoint for this chain: `rpc_url` first, then the environment
    pub fn rpc_endpoint<'a>(&'a self, rpc: &'a RpcConfig) -> Result<&'a str> {
        if let Some(url) = self.rpc_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url);
        }
        rpc.get(self.chain_id).ok_or_else(|| {
            Error::Config(format!(
                "No RPC URL for chain {}; set chain.rpc_url",
                self.chain_id
            ))
        })
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: "Base".to_string(),
            chain_id: chains::BASE,
            search_tag: chains::BASE_TAG.to_string(),
            stable_address: addresses::USDC_BASE.to_string(),
            explorer_tx_url: "https://basescan.org/tx/".to_string(),
            rpc_url: None,
        }
    }
}

/// Remote service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Relay Protocol API (currency list + quotes)
    pub relay_api_url: String,
    /// DexScreener API
    pub dexscreener_api_url: String,
    /// OpenServ platform API (agent secrets)
    pub openserv_api_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            relay_api_url: "https://api.relay.link".to_string(),
            dexscreener_api_url: "https://api.dexscreener.com".to_string(),
            openserv_api_url: "https://api.openserv.ai".to_string(),
        }
    }
}

/// Trading defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Slippage used when the caller supplies none (2.0 = 2%)
    pub default_slippage_percent: f64,
    /// Calls requesting more slippage than this are blocked
    pub max_slippage_percent: f64,
    /// Referrer tag sent with quote requests
    pub referrer: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            default_slippage_percent: 2.0,
            max_slippage_percent: 50.0,
            referrer: "openserv-relay-agent".to_string(),
        }
    }
}

/// Outbound call limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for every HTTP request (seconds)
    pub request_timeout_secs: u64,
    /// How long to wait for a broadcast transaction to be mined (seconds)
    pub receipt_timeout_secs: u64,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    /// Build the shared HTTP client used by all remote collaborators
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout())
            .user_agent(concat!("relay-trading-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 20,
            receipt_timeout_secs: 120,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Target chain
    #[serde(default)]
    pub chain: ChainConfig,
    /// Remote endpoints
    #[serde(default)]
    pub endpoints: Endpoints,
    /// Trading defaults
    #[serde(default)]
    pub trading: TradingConfig,
    /// Timeouts
    #[serde(default)]
    pub http: HttpConfig,
    /// Path to audit log file (JSONL); disabled when unset
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

impl Config {
    /// Load from a JSON file, falling back to defaults for missing sections
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(OPENSERV_API_URL_ENV) {
            tracing::debug!("Using OPENSERV_API_URL for secret store");
            self.endpoints.openserv_api_url = url;
        }
        self
    }

    /// Read the OpenServ API key (never part of the config file)
    pub fn openserv_api_key() -> Option<String> {
        std::env::var(OPENSERV_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
