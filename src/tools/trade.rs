//! `trade_token`: buy a token by ticker with ETH or USDC

use super::{ActionContext, AgentTool, TOOL_TRADE_TOKEN};
use crate::orchestrator::{TradeOrchestrator, TradeRequest, TradeResult};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub struct TradeTokenTool {
    orchestrator: Arc<TradeOrchestrator>,
}

impl TradeTokenTool {
    pub fn new(orchestrator: Arc<TradeOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl AgentTool for TradeTokenTool {
    const NAME: &'static str = TOOL_TRADE_TOKEN;
    type Input = TradeRequest;
    type Output = TradeResult;

    fn description(&self) -> &'static str {
        "Swap ETH or USDC for a token on Base, identified by its ticker (e.g. 'SERV'). \
         The token address is resolved automatically. Requires the name of the workspace \
         secret that holds the wallet private key."
    }

    async fn execute(&self, input: TradeRequest, action: &ActionContext) -> Result<TradeResult> {
        let workspace_id = action.workspace_id();
        Ok(self
            .orchestrator
            .trade(workspace_id.as_deref(), &input)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::orchestrator::test_support::{FakeQuotes, FakeSigners, TEST_KEY};
    use crate::resolver::test_support::{token, FixedStrategy};
    use crate::resolver::{Lookup, TickerResolver, TokenSource};
    use crate::secrets::test_support::MemorySecretStore;
    use crate::secrets::CredentialFetcher;
    use crate::tools::{ToolCall, ToolRegistry};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let orchestrator = TradeOrchestrator::new(
            CredentialFetcher::new(Box::new(MemorySecretStore::new(&[("7", "my_pk", TEST_KEY)]))),
            TickerResolver::new(vec![Box::new(FixedStrategy::new(
                "fixed",
                Lookup::Found(token("SERV", TokenSource::PrimaryList)),
            ))]),
            Arc::new(FakeQuotes::default()),
            Arc::new(FakeSigners::default()),
            &Config::default(),
        );
        let mut registry = ToolRegistry::new();
        registry.register(TradeTokenTool::new(Arc::new(orchestrator)));
        registry
    }

    #[tokio::test]
    async fn test_trade_through_registry() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "1",
            "tool": "trade_token",
            "args": { "ticker": "SERV", "amount": "0.1", "inputCurrency": "native", "pk_name": "my_pk" },
            "action": { "type": "do-task", "workspace": { "id": 42 } }
        }))
        .unwrap();

        let response = registry().call(call).await;

        assert!(response.ok);
        assert_eq!(response.output["success"], true);
        assert_eq!(response.output["resolvedToken"]["source"], "relay");
        assert!(response.output["explorerUrl"]
            .as_str()
            .unwrap()
            .starts_with("https://basescan.org/tx/0x"));
    }

    #[tokio::test]
    async fn test_missing_workspace_reports_configuration_error() {
        let call: ToolCall = serde_json::from_value(json!({
            "tool": "trade_token",
            "args": { "ticker": "SERV", "amount": "0.1", "inputCurrency": "USDC", "secretName": "my_pk" }
        }))
        .unwrap();

        let response = registry().call(call).await;

        assert!(response.ok);
        assert_eq!(response.output["success"], false);
        assert_eq!(response.output["errorKind"], "ConfigurationError");
    }

    #[tokio::test]
    async fn test_missing_arguments_are_validation_errors() {
        let call: ToolCall = serde_json::from_value(json!({
            "tool": "trade_token",
            "args": { "ticker": "SERV" },
            "action": { "workspace": { "id": 1 } }
        }))
        .unwrap();

        let response = registry().call(call).await;

        assert!(!response.ok);
        assert_eq!(response.output["errorKind"], "ValidationError");
    }
}
