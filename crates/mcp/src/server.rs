// MCP server: newline-delimited JSON-RPC 2.0 over stdio

use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    DEFAULT_PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Longest accepted request line in bytes.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Pending responses buffered for the writer task.
const RESPONSE_BUFFER: usize = 64;

#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn start(&self) -> Result<()> {
        tracing::info!(tools = self.registry.len(), "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests read from `reader`, writing responses to `writer`.
    ///
    /// Each request runs on its own task; a single writer task owns the
    /// output so response lines never interleave. Returns once the input is
    /// exhausted and every in-flight request has answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_BUFFER);

        let writer_task = tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, LinesCodec::new());
            while let Some(response) = rx.recv().await {
                let line = serde_json::to_string(&response).context("Failed to serialize response")?;
                sink.send(line).await.context("Failed to write response")?;
            }
            Ok::<_, anyhow::Error>(())
        });

        let mut read_error = None;
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    let server = self.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = server.handle_line(&line).await {
                            if tx.send(response).await.is_err() {
                                tracing::debug!("Writer closed before response was sent");
                            }
                        }
                    });
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!(max = MAX_LINE_LENGTH, "Discarding oversized request line");
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::parse_error("request line too long"),
                    );
                    if tx.send(response).await.is_err() {
                        break;
                    }
                }
                Err(LinesCodecError::Io(e)) => {
                    read_error = Some(e);
                    break;
                }
            }
        }

        drop(tx);
        writer_task.await.context("Writer task panicked")??;

        if let Some(e) = read_error {
            return Err(e).context("Failed to read request");
        }
        tracing::info!("Input closed, MCP server stopping");
        Ok(())
    }

    /// Handle one raw request line; `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable request line");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request(e.to_string()))),
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        tracing::debug!(method = %request.method, id = %id, "Request received");
        let response = match request.method.as_str() {
            "initialize" => self.initialize(id, request.params),
            "ping" => JsonRpcResponse::success(id, &serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                &ListToolsResult {
                    tools: self.registry.list_schemas(),
                },
            ),
            "tools/call" => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    fn initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, "Client connected");
        }

        let result = InitializeResult {
            protocol_version: params
                .protocol_version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        JsonRpcResponse::success(id, &result)
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
                )
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tools/call params"),
                )
            }
        };

        let arguments = params.arguments.unwrap_or(Value::Null);
        match self.registry.call(&params.name, arguments).await {
            Some(result) => JsonRpcResponse::success(id, &result),
            None => JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::news_registry;
    use crate::tools::test_support::service_for;
    use serde_json::json;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server_for(base_url: &str) -> McpServer {
        McpServer::new(news_registry(service_for(base_url), Some("test-key".into())))
    }

    async fn request(server: &McpServer, body: Value) -> Value {
        let response = server.handle_line(&body.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    fn tool_body(response: &Value) -> Value {
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let server = server_for("http://127.0.0.1:9");

        let response = request(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"protocolVersion": "2025-03-26", "capabilities": {},
                              "clientInfo": {"name": "test", "version": "1"}}}),
        )
        .await;

        assert_eq!(response["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(response["result"]["serverInfo"]["name"], "guardian-news-mcp");
        assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let server = server_for("http://127.0.0.1:9");

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;

        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_parse_and_method_errors() {
        let server = server_for("http://127.0.0.1:9");

        let response = serde_json::to_value(server.handle_line("{not json").await.unwrap()).unwrap();
        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null());

        let response = request(&server, json!({"jsonrpc": "2.0", "id": "a", "method": "resources/list"})).await;
        assert_eq!(response["error"]["code"], -32601);
        assert_eq!(response["id"], "a");

        let response = request(&server, json!({"jsonrpc": "2.0", "id": 3, "params": {}})).await;
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_tools_list_has_input_schemas() {
        let server = server_for("http://127.0.0.1:9");

        let response = request(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        let tools = response["result"]["tools"].as_array().unwrap();

        assert_eq!(tools.len(), 7);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let server = server_for("http://127.0.0.1:9");

        let response = request(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "delete_everything", "arguments": {}}}),
        )
        .await;

        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_failed_tool_call_is_error_result() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .expect(1)
            .mount(&mock_server)
            .await;
        let server = server_for(&mock_server.uri());

        let response = request(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                   "params": {"name": "search_news_tool", "arguments": {"query": "climate"}}}),
        )
        .await;

        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        let body = tool_body(&response);
        assert_eq!(body["error"]["kind"], "remote_rejected");
        assert!(body["error"]["message"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_serve_answers_each_request_line() {
        let server = server_for("http://127.0.0.1:9");
        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            String::new(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "health"}})
            .to_string(),
        ]
        .join("\n");

        let (writer, mut output) = tokio::io::duplex(64 * 1024);
        server
            .serve(std::io::Cursor::new(input.into_bytes()), writer)
            .await
            .unwrap();

        let mut written = String::new();
        output.read_to_string(&mut written).await.unwrap();
        let mut responses: Vec<Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        responses.sort_by_key(|r| r["id"].as_i64());

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["result"], json!({}));
        assert_eq!(tool_body(&responses[1])["status"], "ok");
    }
}
