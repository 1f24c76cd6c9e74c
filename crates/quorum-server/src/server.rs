use crate::methods::{self, MethodContext};
use crate::rpc::{JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST, METHOD_NOT_FOUND};
use anyhow::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

static RID: AtomicU64 = AtomicU64::new(1);

fn next_rid() -> String {
    let n = RID.fetch_add(1, Ordering::Relaxed);
    format!("r-{n:06}")
}

/// Line-delimited JSON-RPC: one request per input line, one response per
/// output line. Notifications (no `id`) get no response.
pub struct Server {
    ctx: MethodContext,
    max_msg_bytes: usize,
}

impl Server {
    pub fn new(ctx: MethodContext, max_msg_bytes: usize) -> Self {
        Self { ctx, max_msg_bytes }
    }

    /// Serves stdin/stdout until stdin closes.
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await
    }

    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(resp) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&resp)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        tracing::info!(event = "input_closed");
        Ok(())
    }

    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let rid = next_rid();

        if line.len() > self.max_msg_bytes {
            tracing::warn!(
                event = "limit_exceeded",
                rid = %rid,
                bytes_in = line.len(),
                max = self.max_msg_bytes,
            );
            return Some(JsonRpcResponse::error(
                None,
                INVALID_REQUEST,
                format!("message bytes={} > max={}", line.len(), self.max_msg_bytes),
                Some(serde_json::json!({ "code": "E_LIMIT_EXCEEDED" })),
            ));
        }

        if line.trim().is_empty() {
            return None;
        }

        let req: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                // stdio peers may interleave noise; skip rather than answer
                tracing::warn!(event = "json_parse_error", rid = %rid, error = %e);
                return None;
            }
        };

        let notification = req.id.is_none();
        let resp = self.handle_request(&rid, req).await;
        if notification {
            return None;
        }
        Some(resp)
    }

    async fn handle_request(&self, rid: &str, req: JsonRpcRequest) -> JsonRpcResponse {
        if req.method == "initialize" {
            return JsonRpcResponse::ok(
                req.id,
                serde_json::json!({
                    "serverInfo": {
                        "name": "quorum-server",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "methods": methods::METHODS,
                }),
            );
        }

        let params = req.params.unwrap_or(Value::Null);
        let start = std::time::Instant::now();
        tracing::info!(event = "call_start", rid = %rid, rpc_id = ?req.id, method = %req.method);

        let Some(result) = methods::dispatch(&self.ctx, &req.method, &params).await else {
            return JsonRpcResponse::error(
                req.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", req.method),
                None,
            );
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(value) => {
                tracing::info!(
                    event = "call_done",
                    rid = %rid,
                    method = %req.method,
                    duration_ms,
                    outcome = "ok",
                );
                JsonRpcResponse::ok(req.id, value)
            }
            Err(err) => {
                tracing::info!(
                    event = "call_done",
                    rid = %rid,
                    method = %req.method,
                    duration_ms,
                    outcome = "app_error",
                    code = ?err.error,
                );
                JsonRpcResponse::api_error(req.id, &err)
            }
        }
    }
}
