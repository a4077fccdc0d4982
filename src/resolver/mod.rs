//! Ticker resolution
//!
//! Resolves a human ticker ("SERV", "$brett") to a token contract on the
//! trading chain by asking an ordered list of sources:
//!
//! 1. The Relay currency list - curated, authoritative for supported tokens
//! 2. DexScreener search - long-tail discovery ranked by liquidity and volume
//!
//! The first source with a match wins. A source that fails is treated exactly
//! like a source with no match; resolution itself never errors.

mod dexscreener;
mod relay_list;

pub use dexscreener::{DexScreenerSearch, SearchPair};
pub use relay_list::{RelayCurrency, RelayTokenList};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which source produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenSource {
    /// Relay currency list
    #[serde(rename = "relay")]
    PrimaryList,
    /// DexScreener search
    #[serde(rename = "dexscreener")]
    SecondarySearch,
}

/// A ticker resolved to a contract on the trading chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedToken {
    /// Lowercase hex address, always a valid address
    pub address: String,
    pub chain_id: u64,
    pub symbol: String,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source: TokenSource,
}

/// Outcome of asking a single source
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(ResolvedToken),
    NotFound,
    SourceError(String),
}

/// One source in the resolution chain
#[async_trait]
pub trait ResolverStrategy: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Look up an already-normalized ticker
    async fn lookup(&self, ticker: &str) -> Lookup;
}

/// Uppercase, trim and strip a single leading `$`.
pub fn normalize_ticker(ticker: &str) -> String {
    let upper = ticker.trim().to_uppercase();
    match upper.strip_prefix('$') {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

/// Ordered resolver chain
pub struct TickerResolver {
    strategies: Vec<Box<dyn ResolverStrategy>>,
}

impl TickerResolver {
    pub fn new(strategies: Vec<Box<dyn ResolverStrategy>>) -> Self {
        Self { strategies }
    }

    /// Relay list first, DexScreener second
    pub fn with_default_sources(
        client: reqwest::Client,
        config: &crate::config::Config,
    ) -> Self {
        Self::new(vec![
            Box::new(RelayTokenList::new(
                client.clone(),
                &config.endpoints.relay_api_url,
                config.chain.chain_id,
            )),
            Box::new(DexScreenerSearch::new(
                client,
                &config.endpoints.dexscreener_api_url,
                config.chain.chain_id,
                &config.chain.search_tag,
            )),
        ])
    }

    /// Resolve a ticker. `None` means no source knows it.
    pub async fn resolve(&self, ticker: &str) -> Option<ResolvedToken> {
        let normalized = normalize_ticker(ticker);
        if normalized.is_empty() {
            tracing::warn!(ticker = %ticker, "Empty ticker after normalization");
            return None;
        }

        tracing::info!(ticker = %normalized, "Resolving ticker");

        for strategy in &self.strategies {
            match strategy.lookup(&normalized).await {
                Lookup::Found(token) => {
                    tracing::info!(
                        ticker = %normalized,
                        source = strategy.name(),
                        address = %token.address,
                        symbol = %token.symbol,
                        decimals = token.decimals,
                        "Ticker resolved"
                    );
                    return Some(token);
                }
                Lookup::NotFound => {
                    tracing::debug!(
                        ticker = %normalized,
                        source = strategy.name(),
                        "No match, trying next source"
                    );
                }
                Lookup::SourceError(reason) => {
                    tracing::warn!(
                        ticker = %normalized,
                        source = strategy.name(),
                        error = %reason,
                        "Source lookup failed, trying next source"
                    );
                }
            }
        }

        tracing::info!(ticker = %normalized, "Ticker not found in any source");
        None
    }
}
