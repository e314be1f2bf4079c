//! MCP server implementation.
//!
//! Requests are read as newline-delimited JSON-RPC and handled one at a time
//! in arrival order; a request's handler returns before the next line is read.

use crate::error::{INTERNAL_ERROR, McpError};
use crate::facade::Facade;
use crate::protocol::*;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tally_core::McpConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// JSON-RPC: parse error.
pub const PARSE_ERROR: i32 = -32700;
/// JSON-RPC: method not found.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// The MCP server.
pub struct McpServer {
    config: McpConfig,
    facade: Facade,
}

impl McpServer {
    /// Create a new MCP server with the given configuration.
    pub fn new(config: McpConfig, facade: Facade) -> Self {
        Self { config, facade }
    }

    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    /// Serve stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!(
            server = %self.config.server_name,
            variant = self.facade.variant().noun(),
            "Starting MCP server with stdio transport"
        );
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, writing replies to
    /// `writer`. Returns when `reader` reaches EOF.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                tracing::debug!("Received EOF, shutting down");
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.handle_line(trimmed).await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Request is not valid UTF-8");
                    Some(JsonRpcResponse::error(
                        None,
                        PARSE_ERROR,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            if let Some(response) = response {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable request");
                Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    /// Handle a JSON-RPC request. Notifications get no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }

        let id = request.id.clone();
        tracing::debug!(method = %request.method, "Handling request");

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "resources/list" => self.handle_list_resources(id),
            "resources/read" => self.handle_read_resource(id, request.params),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "prompts/list" => self.handle_list_prompts(id),
            "prompts/get" => self.handle_get_prompt(id, request.params),
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let mut result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.config.server_name,
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "resources": {},
                "tools": {},
                "prompts": {}
            }
        });
        if let Some(instructions) = &self.config.instructions {
            result["instructions"] = json!(instructions);
        }
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_resources(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = ListResourcesResult {
            resources: self.facade.list_resources(),
        };
        to_response(id, &result)
    }

    fn handle_read_resource(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ReadResourceParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::from_error(id, &e),
        };

        match self.facade.read_resource(&params.uri) {
            Ok(result) => to_response(id, &result),
            Err(e) => JsonRpcResponse::from_error(id, &e),
        }
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": self.facade.list_tools() }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::from_error(id, &e),
        };

        if !self.facade.has_tool(&params.name) {
            let err = McpError::UnknownTool { name: params.name };
            return JsonRpcResponse::from_error(id, &err);
        }

        let response = match self.facade.call_tool(&params.name, &params.arguments).await {
            Ok(text) => CallToolResponse::text(text),
            Err(e) => {
                tracing::warn!(tool = %params.name, kind = e.kind(), error = %e, "Tool call failed");
                CallToolResponse::error(e.to_string())
            }
        };
        to_response(id, &response)
    }

    fn handle_list_prompts(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "prompts": self.facade.list_prompts() }))
    }

    fn handle_get_prompt(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: GetPromptParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::from_error(id, &e),
        };

        match self.facade.get_prompt(&params.name, &params.arguments) {
            Ok(result) => to_response(id, &result),
            Err(e) => JsonRpcResponse::from_error(id, &e),
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, McpError> {
    let params = params.ok_or_else(|| McpError::InvalidRequest("missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| McpError::InvalidRequest(e.to_string()))
}

fn to_response<T: serde::Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorCache;
    use std::sync::Arc;
    use tally_core::Variant;
    use tally_store::MemoryStore;

    fn server(variant: Variant) -> McpServer {
        let facade = Facade::new(
            variant,
            Arc::new(MemoryStore::new()),
            Arc::new(MirrorCache::new()),
        );
        McpServer::new(McpConfig::default(), facade)
    }

    async fn call(server: &McpServer, method: &str, params: Option<Value>) -> JsonRpcResponse {
        server
            .handle_request(JsonRpcRequest::new(1, method, params))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = call(&server(Variant::Todo), "initialize", None).await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "tally");
        assert!(result["capabilities"]["resources"].is_object());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(server(Variant::Todo).handle_request(request).await.is_none());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let response = call(&server(Variant::Wish), "tools/list", None).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[0]["name"], "add_wish");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_call_nonexistent_tool() {
        let response = call(
            &server(Variant::Todo),
            "tools/call",
            Some(json!({"name": "nonexistent", "arguments": {}})),
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, crate::error::INVALID_PARAMS);
        assert_eq!(error.data.unwrap()["kind"], "unknown_operation");
    }

    #[tokio::test]
    async fn tool_failure_is_flagged_result() {
        let response = call(
            &server(Variant::Todo),
            "tools/call",
            Some(json!({"name": "create_todo", "arguments": {"text": ""}})),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "required field missing: text");
    }

    #[tokio::test]
    async fn read_missing_resource_is_not_found() {
        let response = call(
            &server(Variant::Todo),
            "resources/read",
            Some(json!({"uri": "todo:///nope"})),
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, crate::error::RESOURCE_NOT_FOUND);
        assert_eq!(error.data.unwrap()["kind"], "not_found");
    }

    #[tokio::test]
    async fn missing_params_is_invalid_request() {
        let response = call(&server(Variant::Todo), "prompts/get", None).await;
        assert_eq!(response.error.unwrap().code, crate::error::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method() {
        let response = call(&server(Variant::Todo), "sampling/createMessage", None).await;
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_answers_each_line_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        server(Variant::Todo)
            .serve(input.as_bytes(), &mut output)
            .await
            .unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["error"]["code"], PARSE_ERROR);
        assert_eq!(replies[2]["result"]["resources"], json!([]));
    }

    #[tokio::test]
    async fn serve_survives_invalid_utf8() {
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.push(b'\n');

        let mut output = Vec::new();
        server(Variant::Todo)
            .serve(input.as_slice(), &mut output)
            .await
            .unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(replies[0]["id"], Value::Null);
        assert_eq!(replies[1]["id"], 1);
        assert_eq!(replies[1]["result"], json!({}));
    }
}
