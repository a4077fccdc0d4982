//! Audit log interceptor
//!
//! Appends one JSON line per tool call start and completion.

use super::{InterceptorDecision, ToolCallContext, ToolInterceptor};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_RESULT_CHARS: usize = 1000;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    context_id: &'a str,
    tool_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace_id: Option<&'a str>,
    args: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u64,
    status: &'static str,
}

impl<'a> AuditEntry<'a> {
    fn new(entry_type: &'static str, context: &'a ToolCallContext, status: &'static str) -> Self {
        Self {
            timestamp: Utc::now(),
            entry_type,
            context_id: &context.context_id,
            tool_name: &context.tool_name,
            call_id: context.call_id.as_deref(),
            workspace_id: context.workspace_id.as_deref(),
            args: &context.args,
            result: None,
            error: None,
            duration_ms: 0,
            status,
        }
    }
}

struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Interceptor that records every tool call to a JSONL file
pub struct AuditLogInterceptor {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLogInterceptor {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    async fn append(&self, entry: &AuditEntry<'_>) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(entry) {
            tracing::warn!(error = %e, path = %writer.path.display(), "Failed to write audit log entry");
        }
    }
}

#[async_trait]
impl ToolInterceptor for AuditLogInterceptor {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision> {
        self.append(&AuditEntry::new("tool_call_start", context, "pending"))
            .await;

        // Audit logging never blocks
        Ok(InterceptorDecision::Allow)
    }

    async fn on_tool_call_complete(
        &self,
        context: &ToolCallContext,
        result: &Result<Value>,
        duration_ms: u64,
    ) {
        // A tool can succeed at the transport level and still report a failed trade
        let (result_value, error, status) = match result {
            Ok(v) if v.get("success") == Some(&Value::Bool(false)) => {
                (Some(truncate_result(v)), None, "failed")
            }
            Ok(v) => (Some(truncate_result(v)), None, "success"),
            Err(e) => (None, Some(e.to_string()), "error"),
        };

        let mut entry = AuditEntry::new("tool_call_complete", context, status);
        entry.result = result_value;
        entry.error = error;
        entry.duration_ms = duration_ms;
        self.append(&entry).await;
    }
}

/// Truncate result for logging
fn truncate_result(result: &Value) -> Value {
    let s = serde_json::to_string(result).unwrap_or_default();
    if s.chars().count() > MAX_RESULT_CHARS {
        let head: String = s.chars().take(MAX_RESULT_CHARS).collect();
        Value::String(format!("{}... [truncated]", head))
    } else {
        result.clone()
    }
}
