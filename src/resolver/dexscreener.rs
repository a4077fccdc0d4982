//! DexScreener search source
//!
//! Symbol collisions are common in open token ecosystems, so candidates are
//! ranked by pool liquidity (then 24h volume) as a proxy for the token the
//! user means. DexScreener does not reliably report decimals; 18 is assumed.

use super::{Lookup, ResolvedToken, ResolverStrategy, TokenSource};
use crate::tokens::is_valid_address;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const ASSUMED_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    pairs: Option<Vec<Value>>,
}

/// A trading pair from the search endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPair {
    #[serde(default)]
    pub chain_id: String,
    pub base_token: Option<PairToken>,
    #[serde(default)]
    pub liquidity: Option<Liquidity>,
    #[serde(default)]
    pub volume: Option<Volume>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairToken {
    pub symbol: Option<String>,
    pub address: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Liquidity {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Volume {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h24: f64,
}

/// Accept numbers, numeric strings or null; anything unparsable counts as 0
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

impl SearchPair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().map(|l| l.usd).unwrap_or(0.0)
    }

    fn volume_h24(&self) -> f64 {
        self.volume.as_ref().map(|v| v.h24).unwrap_or(0.0)
    }
}

/// Pick the best pair for `ticker` on the chain tagged `chain_tag`
pub(crate) fn select_pair<'a>(
    pairs: &'a [SearchPair],
    ticker: &str,
    chain_tag: &str,
) -> Option<&'a SearchPair> {
    let mut candidates: Vec<&SearchPair> = pairs
        .iter()
        .filter(|pair| pair.chain_id == chain_tag)
        .filter(|pair| {
            pair.base_token.as_ref().is_some_and(|token| {
                token
                    .symbol
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(ticker))
                    && token.address.as_deref().is_some_and(is_valid_address)
            })
        })
        .collect();

    // Stable sort: equal keys keep their search order
    candidates.sort_by(|a, b| {
        b.liquidity_usd()
            .total_cmp(&a.liquidity_usd())
            .then_with(|| b.volume_h24().total_cmp(&a.volume_h24()))
    });

    candidates.into_iter().next()
}

/// Searches DexScreener for pairs whose base token carries the ticker
pub struct DexScreenerSearch {
    client: Client,
    base_url: String,
    chain_id: u64,
    chain_tag: String,
}

impl DexScreenerSearch {
    pub fn new(client: Client, base_url: &str, chain_id: u64, chain_tag: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id,
            chain_tag: chain_tag.to_string(),
        }
    }

    async fn search(&self, ticker: &str) -> Result<Vec<SearchPair>, String> {
        let url = format!("{}/latest/dex/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", ticker)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("Request failed: {}", response.status().as_u16()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        // One odd pair must not hide the rest
        Ok(body
            .pairs
            .unwrap_or_default()
            .into_iter()
            .filter_map(|pair| serde_json::from_value::<SearchPair>(pair).ok())
            .collect())
    }

    fn to_resolved(&self, pair: &SearchPair, ticker: &str) -> Option<ResolvedToken> {
        let token = pair.base_token.as_ref()?;
        Some(ResolvedToken {
            address: token.address.as_deref()?.to_lowercase(),
            chain_id: self.chain_id,
            symbol: token.symbol.clone().unwrap_or_else(|| ticker.to_string()),
            decimals: ASSUMED_DECIMALS,
            name: token.name.clone(),
            source: TokenSource::SecondarySearch,
        })
    }
}

#[async_trait]
impl ResolverStrategy for DexScreenerSearch {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn lookup(&self, ticker: &str) -> Lookup {
        let pairs = match self.search(ticker).await {
            Ok(pairs) => pairs,
            Err(e) => return Lookup::SourceError(e),
        };

        if pairs.is_empty() {
            return Lookup::NotFound;
        }

        let Some(pair) = select_pair(&pairs, ticker, &self.chain_tag) else {
            tracing::debug!(
                ticker = %ticker,
                chain = %self.chain_tag,
                results = pairs.len(),
                "No pairs on target chain"
            );
            return Lookup::NotFound;
        };

        tracing::info!(
            ticker = %ticker,
            liquidity_usd = pair.liquidity_usd(),
            volume_h24_usd = pair.volume_h24(),
            "Selected DexScreener pair"
        );

        match self.to_resolved(pair, ticker) {
            Some(token) => Lookup::Found(token),
            None => Lookup::NotFound,
        }
    }
}
