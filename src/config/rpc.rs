//! RPC endpoint configuration
//!
//! Resolution order for the trading chain:
//! 1. `BASE_RPC_URL` - highest priority
//! 2. `ALCHEMY_API_KEY` - builds the Alchemy URL
//! 3. Public RPC fallback - rate limited, for testing only
//!
//! ```bash
//! export BASE_RPC_URL="https://base-mainnet.g.alchemy.com/v2/YOUR_KEY"
//! ```

use crate::tokens::chains;
use std::collections::HashMap;

/// RPC configuration keyed by chain ID
#[derive(Debug, Clone)]
pub struct RpcConfig {
    urls: HashMap<u64, String>,
}

/// Environment variable names
mod env_vars {
    pub const BASE_RPC_URL: &str = "BASE_RPC_URL";
    pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
}

/// Public RPC endpoints (rate limited, for testing only)
mod public_rpcs {
    pub const BASE: &str = "https://mainnet.base.org";
}

impl RpcConfig {
    /// Create RPC config from environment variables
    pub fn from_env() -> Self {
        let base_url = std::env::var(env_vars::BASE_RPC_URL).ok();
        let alchemy_key = std::env::var(env_vars::ALCHEMY_API_KEY).ok();
        Self::resolve(base_url, alchemy_key)
    }

    fn resolve(base_url: Option<String>, alchemy_key: Option<String>) -> Self {
        let mut urls = HashMap::new();

        if let Some(url) = base_url.filter(|u| !u.is_empty()) {
            tracing::debug!("Using BASE_RPC_URL for Base");
            urls.insert(chains::BASE, url);
        } else if let Some(key) = alchemy_key.filter(|k| !k.is_empty()) {
            tracing::info!("Building Base RPC URL from ALCHEMY_API_KEY");
            urls.insert(
                chains::BASE,
                format!("https://base-mainnet.g.alchemy.com/v2/{}", key),
            );
        } else {
            tracing::warn!("No RPC configured for Base, using public RPC (rate limited)");
            urls.insert(chains::BASE, public_rpcs::BASE.to_string());
        }

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
