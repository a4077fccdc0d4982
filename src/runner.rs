//! Agent runner
//!
//! Serves the tool registry over a line-delimited JSON stream: one `ToolCall`
//! per input line, one `ToolResponse` per output line. Calls run concurrently,
//! so responses may come back in a different order than requests; the `id`
//! field correlates them.

use crate::config::{Config, RpcConfig};
use crate::error::ErrorKind;
use crate::interceptors::{AuditLogInterceptor, SlippageGuardInterceptor};
use crate::orchestrator::TradeOrchestrator;
use crate::tools::{EchoTool, ToolCall, ToolRegistry, ToolResponse, TradeTokenTool};
use crate::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Agent runner that owns the tool registry
pub struct AgentRunner {
    registry: Arc<ToolRegistry>,
}

impl AgentRunner {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Build the production registry: both tools, slippage guard, optional audit log
    pub fn from_config(config: &Config, rpc: &RpcConfig) -> Result<Self> {
        let orchestrator = TradeOrchestrator::from_config(config, rpc)?;

        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(TradeTokenTool::new(Arc::new(orchestrator)));

        if let Some(path) = &config.audit_log_path {
            info!(path = %path, "Audit log enabled");
            registry.add_interceptor(Arc::new(AuditLogInterceptor::new(path)));
        }
        registry.add_interceptor(Arc::new(SlippageGuardInterceptor::new(
            config.trading.max_slippage_percent,
        )));

        Ok(Self::new(registry))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one request line. Blank lines yield no response.
    pub async fn handle_line(&self, line: &str) -> Option<ToolResponse> {
        handle_line(&self.registry, line).await
    }

    /// Serve requests until `reader` reaches EOF, then wait for in-flight calls
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<ToolResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        info!(tools = ?self.registry.names(), "Agent runner ready");

        let mut lines = reader.lines();
        let mut received = 0usize;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            received += 1;

            let registry = Arc::clone(&self.registry);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = handle_line(&registry, &line).await {
                    // Receiver only closes if the writer failed
                    let _ = tx.send(response);
                }
            });
        }

        debug!(requests = received, "Input closed, draining in-flight calls");
        drop(tx);

        match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e).into()),
        }
    }
}

async fn handle_line(registry: &ToolRegistry, line: &str) -> Option<ToolResponse> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<ToolCall>(line) {
        Ok(call) => {
            debug!(tool = %call.tool, id = ?call.id, "Dispatching tool call");
            Some(registry.call(call).await)
        }
        Err(e) => {
            warn!(error = %e, "Malformed request line");
            Some(ToolResponse::failure(
                None,
                ErrorKind::ValidationError,
                format!("Malformed request: {}", e),
            ))
        }
    }
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<ToolResponse>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
