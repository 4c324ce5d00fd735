//! Stdio MCP server loop.

use std::sync::Arc;
use std::time::Duration;

use audit::{Event, EventKind, EventStore};
use context::Context;
use registry::{RegistryError, ToolRegistry};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::error::Result;
use crate::protocol::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, InitializeResult,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo, ToolsCapability,
};

/// Maximum accepted frame size (1MB). Larger frames are rejected without
/// being parsed.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Serves a [`ToolRegistry`] over line-delimited JSON-RPC.
///
/// Each `tools/call` runs against a fresh root [`Context`]; requests never
/// share state through the server. Registry errors are mapped to JSON-RPC
/// error codes, so the peer always sees a structured envelope.
pub struct StdioServer {
    registry: Arc<ToolRegistry>,
    audit: Option<EventStore>,
    call_timeout: Option<Duration>,
}

impl StdioServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            audit: None,
            call_timeout: None,
        }
    }

    /// Record every tool call and outcome in the given event store.
    pub fn with_audit(mut self, store: EventStore) -> Self {
        self.audit = Some(store);
        self
    }

    /// Bound the wall-clock time of each tool call. A call that overruns
    /// gets an internal-error response; the connection stays up.
    pub fn with_call_timeout(mut self, limit: Duration) -> Self {
        self.call_timeout = Some(limit);
        self
    }

    /// Serve on the process's stdin/stdout until EOF.
    pub async fn serve(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    /// Serve on the given reader/writer until EOF.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = if line.len() > MAX_FRAME_SIZE {
                Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::new(
                        PARSE_ERROR,
                        format!("frame too large: {} bytes (max {MAX_FRAME_SIZE})", line.len()),
                    ),
                ))
            } else {
                match serde_json::from_str::<JsonRpcRequest>(&line) {
                    Ok(request) => self.handle(request).await,
                    Err(e) => Some(JsonRpcResponse::failure(
                        None,
                        JsonRpcError::new(PARSE_ERROR, format!("invalid frame: {e}")),
                    )),
                }
            };

            if let Some(response) = response {
                let frame = serde_json::to_string(&response)?;
                writer.write_all(frame.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
    }

    /// Dispatch one request. Returns `None` for notifications.
    async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            tracing::debug!(method = request.method, "notification");
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result()),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.registry.list().into_iter().map(Into::into).collect(),
                },
            ),
            "tools/call" => self.handle_call(id, request.params).await,
            method => JsonRpcResponse::failure(
                Some(id),
                JsonRpcError::new(METHOD_NOT_FOUND, format!("unknown method: {method}")),
            ),
        };
        Some(response)
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: ServerInfo {
                name: "coxswain".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    async fn handle_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params
            .map(serde_json::from_value)
            .unwrap_or(Ok(CallToolParams {
                name: String::new(),
                arguments: None,
            })) {
            Ok(p) if !p.name.is_empty() => p,
            Ok(_) => {
                return JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::new(INVALID_PARAMS, "missing tool name"),
                );
            }
            Err(e) => {
                return JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::new(INVALID_PARAMS, format!("invalid params: {e}")),
                );
            }
        };

        let arguments = params.arguments.unwrap_or_else(|| Value::Object(Default::default()));

        // Every request gets its own context chain.
        let ctx = Context::new();
        let workflow_id = ctx.initialize_workflow();
        self.record(Event::new(workflow_id, EventKind::WorkflowStart));
        self.record(Event::tool_call(workflow_id, &params.name, arguments.clone()));

        let call = self
            .registry
            .execute_with_validation(&params.name, arguments, &ctx);
        let result = match self.call_timeout {
            Some(limit) => match timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    self.record(Event::tool_outcome(
                        workflow_id,
                        &params.name,
                        false,
                        "timed out",
                    ));
                    self.record(Event::new(workflow_id, EventKind::WorkflowEnd));
                    return JsonRpcResponse::failure(
                        Some(id),
                        JsonRpcError::new(
                            INTERNAL_ERROR,
                            format!("tool '{}' timed out", params.name),
                        ),
                    );
                }
            },
            None => call.await,
        };

        let response = match result {
            Ok(value) => {
                self.record(Event::tool_outcome(
                    workflow_id,
                    &params.name,
                    true,
                    value.to_string(),
                ));
                JsonRpcResponse::success(id, CallToolResult::text(value.to_string()))
            }
            Err(e) => {
                self.record(Event::tool_outcome(workflow_id, &params.name, false, e.to_string()));
                JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::new(error_code(&e), e.to_string()),
                )
            }
        };
        self.record(Event::new(workflow_id, EventKind::WorkflowEnd));
        response
    }

    /// Audit writes are best effort; a full disk must not take the
    /// transport down.
    fn record(&self, event: Event) {
        if let Some(store) = &self.audit {
            if let Err(e) = store.append(&event) {
                tracing::warn!(error = %e, "failed to append audit event");
            }
        }
    }
}

fn error_code(error: &RegistryError) -> i32 {
    match error {
        RegistryError::ToolNotFound(_) => METHOD_NOT_FOUND,
        RegistryError::MalformedArguments { .. } => INVALID_PARAMS,
        RegistryError::ToolExecution { .. } => INTERNAL_ERROR,
        RegistryError::DuplicateTool(_) | RegistryError::EmptyToolName => INTERNAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use registry::{Schema, Tool, ToolError, ToolSpec};
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(
                "echo",
                "Echo the given text back",
                Schema::object([("text", Schema::String)], ["text"]),
            )
        }

        async fn execute(&self, args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
            Ok(args["text"].clone())
        }
    }

    struct BoomTool;

    #[async_trait]
    impl Tool for BoomTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("boom", "Always fails", Schema::Any)
        }

        async fn execute(&self, _args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
            Err(ToolError::Execution("boom".to_string()))
        }
    }

    struct SleepTool;

    #[async_trait]
    impl Tool for SleepTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("sleep", "Sleeps forever", Schema::Any)
        }

        async fn execute(&self, _args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    fn test_registry() -> Arc<ToolRegistry> {
        Arc::new(
            ToolRegistry::new()
                .with_tool(Arc::new(EchoTool))
                .and_then(|r| r.with_tool(Arc::new(BoomTool)))
                .and_then(|r| r.with_tool(Arc::new(SleepTool)))
                .unwrap(),
        )
    }

    /// Feed frames through the server and return the parsed responses.
    async fn roundtrip(server: &StdioServer, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        server
            .run(BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn initialize_advertises_tools() {
        let server = StdioServer::new(test_registry());
        let responses = roundtrip(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\"}\n",
        )
        .await;

        assert_eq!(responses.len(), 1);
        let result = &responses[0]["result"];
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "coxswain");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn tools_list_returns_specs_in_order() {
        let server = StdioServer::new(test_registry());
        let responses = roundtrip(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n",
        )
        .await;

        let tools = responses[0]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
        assert_eq!(tools[1]["name"], "boom");
    }

    #[tokio::test]
    async fn tool_call_returns_text_content() {
        let server = StdioServer::new(test_registry());
        let frame = json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": "hi"}}
        });
        let responses = roundtrip(&server, &format!("{frame}\n")).await;

        assert_eq!(responses[0]["id"], 7);
        assert_eq!(
            responses[0]["result"]["content"][0],
            json!({"type": "text", "text": "\"hi\""})
        );
        assert_eq!(responses[0]["result"]["isError"], false);
    }

    #[tokio::test]
    async fn unknown_tool_maps_to_method_not_found() {
        let server = StdioServer::new(test_registry());
        let frame = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "missing"}
        });
        let responses = roundtrip(&server, &format!("{frame}\n")).await;
        assert_eq!(responses[0]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_arguments_map_to_invalid_params() {
        let server = StdioServer::new(test_registry());
        let frame = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": 42}}
        });
        let responses = roundtrip(&server, &format!("{frame}\n")).await;
        assert_eq!(responses[0]["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn tool_failure_maps_to_internal_error() {
        let server = StdioServer::new(test_registry());
        let frame = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "boom"}
        });
        let responses = roundtrip(&server, &format!("{frame}\n")).await;

        let error = &responses[0]["error"];
        assert_eq!(error["code"], INTERNAL_ERROR);
        // The envelope carries the tool name and original message, no trace.
        let message = error["message"].as_str().unwrap();
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn unparseable_frame_gets_parse_error_with_null_id() {
        let server = StdioServer::new(test_registry());
        let responses = roundtrip(&server, "{not json\n").await;

        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert!(responses[0]["id"].is_null());
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let server = StdioServer::new(test_registry());
        let responses = roundtrip(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"resources/list\"}\n",
        )
        .await;
        assert_eq!(responses[0]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let server = StdioServer::new(test_registry());
        let input = "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n\
                     {\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        let responses = roundtrip(&server, input).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
    }

    #[tokio::test]
    async fn slow_tool_hits_call_timeout() {
        let server =
            StdioServer::new(test_registry()).with_call_timeout(Duration::from_millis(10));
        let frame = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "sleep"}
        });
        let responses = roundtrip(&server, &format!("{frame}\n")).await;

        assert_eq!(responses[0]["error"]["code"], INTERNAL_ERROR);
        assert!(
            responses[0]["error"]["message"]
                .as_str()
                .unwrap()
                .contains("timed out")
        );
    }

    #[tokio::test]
    async fn audit_records_call_and_outcome() {
        let server = StdioServer::new(test_registry()).with_audit(EventStore::in_memory().unwrap());
        let frame = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": "hi"}}
        });
        roundtrip(&server, &format!("{frame}\n")).await;

        let store = server.audit.as_ref().unwrap();
        let workflows = store.list_workflows().unwrap();
        assert_eq!(workflows.len(), 1);

        let events = store.load_workflow(workflows[0].id, None).unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.kind.name()).collect();
        assert_eq!(
            kinds,
            vec!["workflow_start", "tool_call", "tool_outcome", "workflow_end"]
        );
        match &events[2].kind {
            EventKind::ToolOutcome { name, ok, .. } => {
                assert_eq!(name, "echo");
                assert!(ok);
            }
            other => panic!("expected ToolOutcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_unparsed() {
        let server = StdioServer::new(test_registry());
        let big = format!(
            "{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"params\":\"{}\"}}\n",
            "x".repeat(MAX_FRAME_SIZE)
        );
        let responses = roundtrip(&server, &big).await;

        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert!(
            responses[0]["error"]["message"]
                .as_str()
                .unwrap()
                .contains("frame too large")
        );
    }
}
