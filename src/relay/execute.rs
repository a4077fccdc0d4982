//! Broadcasts the transaction steps of a quote

use super::parse_quantity;
use super::quote::{Quote, StepItem, StepKind};
use crate::wallet::{PreparedTransaction, TransactionSigner};
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, U256};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionData {
    to: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    chain_id: u64,
    #[serde(default)]
    gas: Option<Value>,
    #[serde(default)]
    max_fee_per_gas: Option<Value>,
    #[serde(default)]
    max_priority_fee_per_gas: Option<Value>,
}

fn optional_quantity<T: TryFrom<U256>>(field: &str, value: Option<&Value>) -> Result<Option<T>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_quantity(v)
            .and_then(|q| T::try_from(q).ok())
            .map(Some)
            .ok_or_else(|| Error::UnsupportedRoute(format!("Malformed {} in step data", field))),
    }
}

fn prepare(item: &StepItem) -> Result<PreparedTransaction> {
    let data = item
        .data
        .clone()
        .ok_or_else(|| Error::UnsupportedRoute("Transaction item has no data".to_string()))?;
    let data: TransactionData = serde_json::from_value(data)
        .map_err(|e| Error::UnsupportedRoute(format!("Malformed transaction data: {}", e)))?;

    let to = Address::from_str(&data.to)
        .map_err(|_| Error::UnsupportedRoute(format!("Malformed target address: {}", data.to)))?;

    let input = match data.data.as_deref() {
        None | Some("") | Some("0x") => Bytes::new(),
        Some(hex) => Bytes::from_str(hex)
            .map_err(|_| Error::UnsupportedRoute("Malformed calldata".to_string()))?,
    };

    let value = match data.value.as_ref() {
        None | Some(Value::Null) => U256::ZERO,
        Some(v) => parse_quantity(v)
            .ok_or_else(|| Error::UnsupportedRoute("Malformed value in step data".to_string()))?,
    };

    Ok(PreparedTransaction {
        to,
        data: input,
        value,
        gas_limit: optional_quantity("gas", data.gas.as_ref())?,
        max_fee_per_gas: optional_quantity("maxFeePerGas", data.max_fee_per_gas.as_ref())?,
        max_priority_fee_per_gas: optional_quantity(
            "maxPriorityFeePerGas",
            data.max_priority_fee_per_gas.as_ref(),
        )?,
        chain_id: data.chain_id,
    })
}

/// Runs a quote's transaction steps in order.
///
/// The whole route is checked before anything is broadcast, so a route the
/// executor cannot finish fails without spending gas. Broadcasts are never
/// retried.
#[derive(Debug, Clone)]
pub struct SwapExecutor {
    chain_id: u64,
}

impl SwapExecutor {
    /// Executor for routes that stay on `chain_id`
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    /// Turn every pending item into a transaction, in step order
    pub fn plan(&self, quote: &Quote) -> Result<Vec<(String, PreparedTransaction)>> {
        let mut plan = Vec::new();

        for step in quote.steps() {
            let pending: Vec<&StepItem> =
                step.items.iter().filter(|item| !item.is_complete()).collect();
            if pending.is_empty() {
                continue;
            }

            match step.kind {
                StepKind::Transaction => {
                    for item in pending {
                        let tx = prepare(item)?;
                        if tx.chain_id != self.chain_id {
                            return Err(Error::UnsupportedRoute(format!(
                                "Step \"{}\" targets chain {}, expected {}",
                                step.id, tx.chain_id, self.chain_id
                            )));
                        }
                        plan.push((step.id.clone(), tx));
                    }
                }
                StepKind::Signature => {
                    return Err(Error::UnsupportedRoute(format!(
                        "Step \"{}\" requires an off-chain signature",
                        step.id
                    )));
                }
                StepKind::Other => {
                    return Err(Error::UnsupportedRoute(format!(
                        "Step \"{}\" has an unsupported kind",
                        step.id
                    )));
                }
            }
        }

        if plan.is_empty() {
            return Err(Error::UnsupportedRoute(
                "Quote contains no transactions to execute".to_string(),
            ));
        }
        Ok(plan)
    }

    /// Broadcast the route and return the hash of the final transaction
    pub async fn execute(&self, quote: &Quote, signer: &dyn TransactionSigner) -> Result<String> {
        let plan = self.plan(quote)?;
        let total = plan.len();
        let mut sent: Vec<String> = Vec::with_capacity(total);

        for (index, (step_id, tx)) in plan.into_iter().enumerate() {
            tracing::info!(
                step = %step_id,
                index = index + 1,
                total,
                to = %tx.to,
                "Executing step"
            );

            match signer.send_transaction(tx).await {
                Ok(hash) => sent.push(hash),
                Err(e) if sent.is_empty() => return Err(e),
                Err(e) => {
                    return Err(Error::Execution(format!(
                        "{} (already broadcast: {})",
                        e,
                        sent.join(", ")
                    )))
                }
            }
        }

        sent.pop()
            .ok_or_else(|| Error::Execution("No transaction was broadcast".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const ROUTER: &str = "0xa5f565650890fba1824ee0f21ebbbf660a179934";

    /// Records broadcasts; fails the call at `fail_at` (0-based) if set
    #[derive(Default)]
    struct RecordingSigner {
        sent: Mutex<Vec<PreparedTransaction>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl TransactionSigner for RecordingSigner {
        fn address(&self) -> Address {
            Address::ZERO
        }

        async fn send_transaction(&self, tx: PreparedTransaction) -> Result<String> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_at == Some(sent.len()) {
                return Err(Error::Execution("reverted".to_string()));
            }
            sent.push(tx);
            Ok(format!("0x{:064x}", sent.len()))
        }
    }

    fn tx_item(status: &str, value: &str) -> Value {
        json!({
            "status": status,
            "data": {
                "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                "to": ROUTER,
                "data": "0xdeadbeef",
                "value": value,
                "chainId": 8453,
                "gas": "210000",
                "maxFeePerGas": "0x3b9aca00",
                "maxPriorityFeePerGas": 1000000
            }
        })
    }

    fn quote(steps: Value) -> Quote {
        Quote::from_payload(json!({ "steps": steps })).unwrap()
    }

    #[test]
    fn test_prepare_parses_quantities() {
        let q = quote(json!([{ "id": "swap", "kind": "transaction", "items": [tx_item("incomplete", "100")] }]));
        let plan = SwapExecutor::new(8453).plan(&q).unwrap();
        let (_, tx) = &plan[0];

        assert_eq!(tx.to, Address::from_str(ROUTER).unwrap());
        assert_eq!(tx.data.to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(tx.value, U256::from(100));
        assert_eq!(tx.gas_limit, Some(210_000));
        assert_eq!(tx.max_fee_per_gas, Some(1_000_000_000));
        assert_eq!(tx.max_priority_fee_per_gas, Some(1_000_000));
        assert_eq!(tx.chain_id, 8453);
    }

    #[tokio::test]
    async fn test_executes_steps_in_order_and_returns_last_hash() {
        let q = quote(json!([
            { "id": "approve", "kind": "transaction", "items": [tx_item("incomplete", "0")] },
            { "id": "swap", "kind": "transaction", "items": [tx_item("incomplete", "5")] }
        ]));
        let signer = RecordingSigner::default();

        let hash = SwapExecutor::new(8453).execute(&q, &signer).await.unwrap();

        assert_eq!(hash, format!("0x{:064x}", 2));
        let sent = signer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].value, U256::ZERO);
        assert_eq!(sent[1].value, U256::from(5));
    }

    #[tokio::test]
    async fn test_complete_items_are_skipped() {
        let q = quote(json!([
            { "id": "approve", "kind": "transaction", "items": [tx_item("complete", "0")] },
            { "id": "swap", "kind": "transaction", "items": [tx_item("incomplete", "7")] }
        ]));
        let signer = RecordingSigner::default();

        SwapExecutor::new(8453).execute(&q, &signer).await.unwrap();
        let sent = signer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].value, U256::from(7));
    }

    #[tokio::test]
    async fn test_signature_step_fails_before_broadcast() {
        let q = quote(json!([
            { "id": "swap", "kind": "transaction", "items": [tx_item("incomplete", "1")] },
            { "id": "authorize", "kind": "signature", "items": [{ "status": "incomplete", "data": {} }] }
        ]));
        let signer = RecordingSigner::default();

        let err = SwapExecutor::new(8453).execute(&q, &signer).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedRoute(_)));
        assert!(signer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_route_is_unsupported() {
        let signer = RecordingSigner::default();
        let err = SwapExecutor::new(8453)
            .execute(&quote(json!([])), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedRoute(_)));
    }

    #[tokio::test]
    async fn test_malformed_item_fails_before_broadcast() {
        let q = quote(json!([
            { "id": "approve", "kind": "transaction", "items": [tx_item("incomplete", "0")] },
            { "id": "swap", "kind": "transaction", "items": [{ "status": "incomplete", "data": { "to": "nope", "chainId": 8453 } }] }
        ]));
        let signer = RecordingSigner::default();

        assert!(SwapExecutor::new(8453).execute(&q, &signer).await.is_err());
        assert!(signer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_chain_item_fails_before_broadcast() {
        let mut foreign = tx_item("incomplete", "5");
        foreign["data"]["chainId"] = json!(1);
        let q = quote(json!([
            { "id": "approve", "kind": "transaction", "items": [tx_item("incomplete", "0")] },
            { "id": "swap", "kind": "transaction", "items": [foreign] }
        ]));
        let signer = RecordingSigner::default();

        let err = SwapExecutor::new(8453).execute(&q, &signer).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedRoute(_)));
        assert!(err.to_string().contains("chain 1"));
        assert!(signer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_after_broadcast_reports_sent_hashes() {
        let q = quote(json!([
            { "id": "approve", "kind": "transaction", "items": [tx_item("incomplete", "0")] },
            { "id": "swap", "kind": "transaction", "items": [tx_item("incomplete", "5")] }
        ]));
        let signer = RecordingSigner {
            fail_at: Some(1),
            ..Default::default()
        };

        let err = SwapExecutor::new(8453).execute(&q, &signer).await.unwrap_err();
        assert!(err.to_string().contains(&format!("0x{:064x}", 1)));
        // no retry
        assert_eq!(signer.sent.lock().unwrap().len(), 1);
    }
}
