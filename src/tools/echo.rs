//! Diagnostic tool that echoes what it receives

use super::{ActionContext, AgentTool, TOOL_TEST};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ts_rs::TS;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct EchoInput {
    /// Optional test message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
}

pub struct EchoTool;

#[async_trait]
impl AgentTool for EchoTool {
    const NAME: &'static str = TOOL_TEST;
    type Input = EchoInput;
    type Output = Value;

    fn description(&self) -> &'static str {
        "Test capability that echoes the received parameters"
    }

    async fn execute(&self, input: EchoInput, action: &ActionContext) -> Result<Value> {
        tracing::info!(
            message = input.message.as_deref().unwrap_or(""),
            action_type = action.kind.as_deref().unwrap_or(""),
            workspace_id = action.workspace_id().as_deref().unwrap_or(""),
            task_id = action.task_id().as_deref().unwrap_or(""),
            "Test capability invoked"
        );

        Ok(json!({
            "success": true,
            "message": "Test capability executed successfully",
            "timestamp": Utc::now().to_rfc3339(),
            "receivedArgs": input,
        }))
    }
}
