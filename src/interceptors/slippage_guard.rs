//! Slippage guard interceptor
//!
//! Blocks trades whose requested slippage exceeds the configured maximum.

use super::{InterceptorDecision, ToolCallContext, ToolInterceptor};
use crate::tools::TOOL_TRADE_TOKEN;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Interceptor that blocks trades with excessive slippage
pub struct SlippageGuardInterceptor {
    /// Maximum allowed slippage (e.g., 50.0 for 50%)
    max_slippage_percent: f64,
}

impl SlippageGuardInterceptor {
    pub fn new(max_slippage_percent: f64) -> Self {
        Self {
            max_slippage_percent,
        }
    }
}

/// Requested slippage in percent. Unparsable values are left to the tool.
fn requested_slippage(args: &Value) -> Option<f64> {
    match args.get("slippage")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            s.strip_suffix('%').unwrap_or(s).trim().parse().ok()
        }
        _ => None,
    }
}

#[async_trait]
impl ToolInterceptor for SlippageGuardInterceptor {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision> {
        if context.tool_name != TOOL_TRADE_TOKEN {
            return Ok(InterceptorDecision::Allow);
        }

        let Some(slippage) = requested_slippage(&context.args) else {
            return Ok(InterceptorDecision::Allow);
        };

        if slippage > self.max_slippage_percent {
            return Ok(InterceptorDecision::Block(format!(
                "Requested slippage {:.2}% exceeds maximum allowed {:.2}%",
                slippage, self.max_slippage_percent
            )));
        }

        tracing::debug!(
            requested_slippage = slippage,
            max_slippage = self.max_slippage_percent,
            "Slippage check passed"
        );

        Ok(InterceptorDecision::Allow)
    }
}
