//! Capabilities exposed to the hosting agent framework
//!
//! Tools implement `AgentTool`. The `ToolRegistry` decodes JSON arguments
//! into each tool's typed input, runs the interceptor pipeline around the call
//! and encodes the output back to JSON.

mod echo;
mod trade;

pub use echo::{EchoInput, EchoTool};
pub use trade::TradeTokenTool;

use crate::error::ErrorKind;
use crate::interceptors::{InterceptorDecision, ToolCallContext, ToolInterceptor};
use crate::orchestrator::TradeResult;
use crate::{Error, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub const TOOL_TEST: &str = "test";
pub const TOOL_TRADE_TOKEN: &str = "trade_token";

/// Reference to a platform object; ids arrive as numbers or strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(default)]
    pub id: Option<Value>,
}

impl ObjectRef {
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Context the platform attaches to a call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub workspace: Option<ObjectRef>,
    #[serde(default)]
    pub task: Option<ObjectRef>,
}

impl ActionContext {
    pub fn workspace_id(&self) -> Option<String> {
        self.workspace.as_ref()?.id_string()
    }

    pub fn task_id(&self) -> Option<String> {
        self.task.as_ref()?.id_string()
    }
}

/// A typed capability
#[async_trait]
pub trait AgentTool: Send + Sync + 'static {
    const NAME: &'static str;
    type Input: DeserializeOwned + JsonSchema + Send;
    type Output: Serialize;

    fn description(&self) -> &'static str;

    async fn execute(&self, input: Self::Input, action: &ActionContext) -> Result<Self::Output>;
}

/// Object-safe view of an `AgentTool`
#[async_trait]
trait ErasedTool: Send + Sync {
    fn description(&self) -> &'static str;

    fn input_schema(&self) -> Value;

    async fn call(&self, args: Value, action: &ActionContext) -> Result<Value>;
}

#[async_trait]
impl<T: AgentTool> ErasedTool for T {
    fn description(&self) -> &'static str {
        AgentTool::description(self)
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(T::Input)).unwrap_or(Value::Null)
    }

    async fn call(&self, args: Value, action: &ActionContext) -> Result<Value> {
        let input: T::Input = serde_json::from_value(args).map_err(|e| {
            Error::InvalidArgument(format!("Invalid arguments for {}: {}", T::NAME, e))
        })?;
        let output = self.execute(input, action).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Listing entry for a registered tool
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One request from the hosting framework
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub tool: String,
    #[serde(default = "empty_args")]
    pub args: Value,
    #[serde(default)]
    pub action: Option<ActionContext>,
}

fn empty_args() -> Value {
    Value::Object(Default::default())
}

/// Response to a `ToolCall`. `ok` is false when the tool could not run;
/// `output` then carries a failure in the same shape as a `TradeResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ok: bool,
    pub output: Value,
}

impl ToolResponse {
    pub(crate) fn failure(id: Option<String>, kind: ErrorKind, message: String) -> Self {
        let output = serde_json::to_value(TradeResult::failure(kind, message)).unwrap_or(Value::Null);
        Self {
            id,
            ok: false,
            output,
        }
    }
}

/// Dispatches calls by tool name through the interceptor pipeline
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn ErasedTool>>,
    interceptors: Vec<Arc<dyn ToolInterceptor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: AgentTool>(&mut self, tool: T) {
        tracing::debug!(tool = T::NAME, "Registered tool");
        self.tools.insert(T::NAME, Arc::new(tool));
    }

    pub fn add_interceptor(&mut self, interceptor: Arc<dyn ToolInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolDefinition {
                name: name.to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub async fn call(&self, call: ToolCall) -> ToolResponse {
        let ToolCall {
            id,
            tool: tool_name,
            args,
            action,
        } = call;

        let Some(tool) = self.tools.get(tool_name.as_str()).cloned() else {
            tracing::warn!(tool = %tool_name, "Unknown tool");
            return ToolResponse::failure(
                id,
                ErrorKind::ValidationError,
                format!("Unknown tool \"{}\" (available: {})", tool_name, self.names().join(", ")),
            );
        };

        let action = action.unwrap_or_default();
        let context = ToolCallContext {
            tool_name,
            args,
            call_id: id.clone(),
            workspace_id: action.workspace_id(),
            context_id: uuid::Uuid::new_v4().to_string(),
        };

        let started = Instant::now();
        let result = match self.run_interceptors(&context).await {
            Ok(()) => tool.call(context.args.clone(), &action).await,
            Err(e) => Err(e),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        for interceptor in &self.interceptors {
            interceptor
                .on_tool_call_complete(&context, &result, duration_ms)
                .await;
        }

        match result {
            Ok(output) => ToolResponse {
                id,
                ok: true,
                output,
            },
            Err(e) => {
                tracing::warn!(tool = %context.tool_name, error = %e, "Tool call failed");
                ToolResponse::failure(id, e.kind(), e.to_string())
            }
        }
    }

    async fn run_interceptors(&self, context: &ToolCallContext) -> Result<()> {
        for interceptor in &self.interceptors {
            if let InterceptorDecision::Block(reason) =
                interceptor.intercept_tool_call(context).await?
            {
                tracing::warn!(tool = %context.tool_name, reason = %reason, "Tool call blocked");
                return Err(Error::InvalidArgument(format!("Blocked: {}", reason)));
            }
        }
        Ok(())
    }
}
