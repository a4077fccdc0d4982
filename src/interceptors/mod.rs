//! Audit and guard interceptors
//!
//! Every tool call passes through this pipeline. Interceptors run in
//! registration order before the call and may block it; after the call each
//! one is notified with the result.

mod audit_log;
mod slippage_guard;

pub use audit_log::AuditLogInterceptor;
pub use slippage_guard::SlippageGuardInterceptor;

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// What an interceptor sees of a tool call
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub tool_name: String,
    pub args: Value,
    /// Caller-supplied request id, if any
    pub call_id: Option<String>,
    pub workspace_id: Option<String>,
    /// Unique per dispatched call
    pub context_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorDecision {
    Allow,
    Block(String),
}

#[async_trait]
pub trait ToolInterceptor: Send + Sync {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision>;

    async fn on_tool_call_complete(
        &self,
        _context: &ToolCallContext,
        _result: &Result<Value>,
        _duration_ms: u64,
    ) {
    }
}

#[cfg(test)]
pub(crate) fn context(tool_name: &str, args: Value) -> ToolCallContext {
    ToolCallContext {
        tool_name: tool_name.to_string(),
        args,
        call_id: None,
        workspace_id: Some("ws-1".to_string()),
        context_id: uuid::Uuid::new_v4().to_string(),
    }
}
