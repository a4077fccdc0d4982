//! Relay currency list source

use super::{Lookup, ResolvedToken, ResolverStrategy, TokenSource};
use crate::tokens::is_valid_address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Default decimals when the list omits them
const DEFAULT_DECIMALS: u8 = 18;

/// Currency entry as returned by Relay
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayCurrency {
    pub symbol: Option<String>,
    pub address: Option<String>,
    pub chain_id: Option<u64>,
    pub decimals: Option<u8>,
    pub name: Option<String>,
}

/// Looks tickers up in Relay's supported-currency list for one chain
pub struct RelayTokenList {
    client: Client,
    base_url: String,
    chain_id: u64,
}

impl RelayTokenList {
    pub fn new(client: Client, base_url: &str, chain_id: u64) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id,
        }
    }

    async fn fetch(&self) -> Result<Value, String> {
        let url = format!("{}/currencies/v1", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("chainId", self.chain_id)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("API returned {}", response.status().as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))
    }
}

/// Flatten the list payload into entries.
///
/// Relay has served a bare array, `{ "currencies": [...] }`, and grouped
/// arrays of arrays; all three are accepted.
fn currency_entries(payload: Value) -> Result<Vec<Value>, String> {
    let list = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("currencies") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("`currencies` is not an array".to_string()),
            None => Vec::new(),
        },
        other => return Err(format!("Unexpected payload: {}", type_name(&other))),
    };

    Ok(list
        .into_iter()
        .flat_map(|item| match item {
            Value::Array(group) => group,
            single => vec![single],
        })
        .collect())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Find the first entry matching `ticker` on `chain_id`
pub(crate) fn find_currency(
    payload: Value,
    ticker: &str,
    chain_id: u64,
) -> Result<Option<ResolvedToken>, String> {
    let found = currency_entries(payload)?
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RelayCurrency>(entry).ok())
        .find_map(|currency| {
            let symbol_matches = currency
                .symbol
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(ticker));
            if !symbol_matches || currency.chain_id != Some(chain_id) {
                return None;
            }

            let address = currency.address.as_deref()?;
            if !is_valid_address(address) {
                return None;
            }

            Some(ResolvedToken {
                address: address.to_lowercase(),
                chain_id,
                symbol: currency.symbol.unwrap_or_else(|| ticker.to_string()),
                decimals: currency.decimals.unwrap_or(DEFAULT_DECIMALS),
                name: currency.name,
                source: TokenSource::PrimaryList,
            })
        });

    Ok(found)
}

#[async_trait]
impl ResolverStrategy for RelayTokenList {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn lookup(&self, ticker: &str) -> Lookup {
        let payload = match self.fetch().await {
            Ok(payload) => payload,
            Err(e) => return Lookup::SourceError(e),
        };

        match find_currency(payload, ticker, self.chain_id) {
            Ok(Some(token)) => Lookup::Found(token),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::SourceError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::TestServer;
    use serde_json::json;

    const SERV: &str = "0x40E3d1A4B2C13B0CE6c3Cd1fd5F4D2fE1e4FC9B1";

    #[test]
    fn test_finds_case_insensitive_symbol_on_chain() {
        let payload = json!([
            { "symbol": "serv", "address": SERV, "chainId": 1, "decimals": 18 },
            { "symbol": "Serv", "address": SERV, "chainId": 8453, "name": "OpenServ" }
        ]);

        let token = find_currency(payload, "SERV", 8453).unwrap().unwrap();
        assert_eq!(token.address, SERV.to_lowercase());
        assert_eq!(token.symbol, "Serv");
        assert_eq!(token.decimals, 18);
        assert_eq!(token.name.as_deref(), Some("OpenServ"));
        assert_eq!(token.source, TokenSource::PrimaryList);
    }

    #[test]
    fn test_wrapped_and_grouped_payloads() {
        let wrapped = json!({ "currencies": [
            { "symbol": "USDC", "address": crate::tokens::addresses::USDC_BASE, "chainId": 8453, "decimals": 6 }
        ]});
        let token = find_currency(wrapped, "USDC", 8453).unwrap().unwrap();
        assert_eq!(token.decimals, 6);

        let grouped = json!([[
            { "symbol": "USDC", "address": crate::tokens::addresses::USDC_BASE, "chainId": 8453, "decimals": 6 }
        ]]);
        assert!(find_currency(grouped, "usdc", 8453).unwrap().is_some());
    }

    #[test]
    fn test_no_match_and_invalid_entries() {
        let payload = json!([
            { "symbol": "DEGEN", "address": "not-an-address", "chainId": 8453 },
            { "symbol": "DEGEN", "chainId": 8453 },
            "garbage"
        ]);
        assert!(find_currency(payload, "DEGEN", 8453).unwrap().is_none());
        assert!(find_currency(json!({}), "DEGEN", 8453).unwrap().is_none());
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(find_currency(json!("nope"), "X", 8453).is_err());
        assert!(find_currency(json!({ "currencies": 5 }), "X", 8453).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_source_error() {
        let source = RelayTokenList::new(Client::new(), "http://127.0.0.1:1", 8453);
        assert!(matches!(source.lookup("SERV").await, Lookup::SourceError(_)));
    }

    #[tokio::test]
    async fn test_list_over_http() {
        let body = json!({ "currencies": [
            { "symbol": "SERV", "address": SERV, "chainId": 8453, "decimals": 18 }
        ]})
        .to_string();
        let server = TestServer::spawn(&[("/currencies/v1", 200, body.as_str())]).await;
        let source = RelayTokenList::new(Client::new(), &server.base_url, 8453);

        match source.lookup("SERV").await {
            Lookup::Found(token) => assert_eq!(token.address, SERV.to_lowercase()),
            other => panic!("unexpected lookup: {other:?}"),
        }
        assert_eq!(server.requests()[0].target(), "/currencies/v1?chainId=8453");
    }

    #[tokio::test]
    async fn test_server_error_is_source_error() {
        let server = TestServer::spawn(&[("/currencies/v1", 500, "{}")]).await;
        let source = RelayTokenList::new(Client::new(), &server.base_url, 8453);

        match source.lookup("SERV").await {
            Lookup::SourceError(reason) => assert_eq!(reason, "API returned 500"),
            other => panic!("unexpected lookup: {other:?}"),
        }
    }
}
