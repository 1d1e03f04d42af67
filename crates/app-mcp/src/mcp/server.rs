use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use switchboard_error::BridgeError;
use switchboard_messaging::{format, ChatService, DEFAULT_READ_LIMIT, MAX_READ_LIMIT};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::tools::ToolRegistry;
use super::types::*;

pub struct McpServer {
    service: ChatService,
    registry: ToolRegistry,
}

/// What to do with one inbound line.
enum Inbound {
    Reply(RpcResponse),
    Call(Value, Option<Value>),
    Ignore,
}

impl McpServer {
    pub fn new(service: ChatService, registry: ToolRegistry) -> Self {
        Self { service, registry }
    }

    pub async fn run(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await?;
        Ok(())
    }

    /// Serve requests until `reader` hits EOF, then wait for in-flight tool
    /// calls to finish and hand the writer back.
    ///
    /// Tool calls run as independent tasks, so a slow remote call does not
    /// hold up later requests. One writer task owns the output, which keeps
    /// every response on its own line.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> io::Result<W>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let mut lines = reader.lines();

        debug!("MCP server started, waiting for requests");

        while let Some(line) = lines.next_line().await? {
            match self.classify(line.trim()) {
                Inbound::Reply(resp) => {
                    let _ = tx.send(resp);
                }
                Inbound::Call(id, params) => {
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let resp = server.handle_tools_call(id, params).await;
                        let _ = tx.send(resp);
                    });
                }
                Inbound::Ignore => {}
            }
        }

        debug!("input closed, MCP server shutting down");
        drop(tx);
        writer_task.await.map_err(io::Error::other)?
    }

    fn classify(&self, line: &str) -> Inbound {
        if line.is_empty() {
            return Inbound::Ignore;
        }

        let msg: RpcMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                return Inbound::Reply(RpcResponse::err(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ))
            }
        };

        let Some(id) = msg.id.clone() else {
            if msg.method.as_deref() == Some("notifications/initialized") {
                debug!("client initialized");
            }
            return Inbound::Ignore;
        };

        if !msg.is_valid_jsonrpc() {
            return Inbound::Reply(RpcResponse::err(
                id,
                INVALID_REQUEST,
                "invalid jsonrpc version (expected \"2.0\")",
            ));
        }

        let resp = match msg.method.as_deref().unwrap_or("") {
            "" => RpcResponse::err(id, INVALID_REQUEST, "missing method"),
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => return Inbound::Call(id, msg.params),
            "ping" => RpcResponse::ok(id, json!({})),
            method => RpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method: {method}")),
        };
        Inbound::Reply(resp)
    }

    fn handle_initialize(&self, id: Value) -> RpcResponse {
        debug!(
            allow_list = self.service.allow_list().len(),
            "initialized"
        );

        RpcResponse::ok(
            id,
            json!({
                "protocolVersion": "2025-11-25",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "switchboard",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> RpcResponse {
        RpcResponse::ok(id, json!({ "tools": self.registry.definitions() }))
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> RpcResponse {
        let params: CallToolParams = match params.and_then(|v| serde_json::from_value(v).ok()) {
            Some(p) => p,
            None => return RpcResponse::err(id, INVALID_PARAMS, "missing or invalid params"),
        };

        let tool_result = match self.dispatch_tool(&params.name, params.arguments.as_ref()).await {
            Ok(result) => result,
            Err(fault) => {
                warn!(tool = %params.name, %fault, "rejected tool call");
                return RpcResponse::err(id, INVALID_PARAMS, fault.to_string());
            }
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => RpcResponse::ok(id, val),
            Err(e) => RpcResponse::err(id, INTERNAL_ERROR, format!("serialization error: {e}")),
        }
    }

    /// Request-shape problems come back as `Err`; everything that goes wrong
    /// once a handler runs is folded into the `Ok` result as `Error: ...` text.
    async fn dispatch_tool(
        &self,
        name: &str,
        args: Option<&Value>,
    ) -> Result<ToolResult, RequestFault> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| RequestFault::UnknownTool(name.to_string()))?;
        let args = args
            .filter(|a| !a.is_null())
            .ok_or(RequestFault::MissingArguments)?;
        for key in tool.required_params() {
            if args.get(key).map_or(true, Value::is_null) {
                return Err(RequestFault::MissingParam(key.to_string()));
            }
        }

        let text = match tool.kind {
            ToolKind::SendMessage => {
                let channel_id = get_id(args, "channel_id")?;
                let message = get_str(args, "message")?;
                let result = self.service.send_message(&channel_id, message).await;
                finish(tool.name, result)
            }
            ToolKind::ReadMessages => {
                let channel_id = get_id(args, "channel_id")?;
                let limit = get_limit(args)?;
                let result = self.service.read_messages(&channel_id, limit).await;
                finish(tool.name, result)
            }
            ToolKind::ListChannels => finish(tool.name, self.service.list_channels().await),
        };

        let result = ToolResult::text(text);
        debug!(tool = tool.name, bytes = result.as_text().len(), "tool call finished");
        Ok(result)
    }
}

fn finish<T: Serialize>(tool: &str, result: Result<T, BridgeError>) -> String {
    if let Err(ref e) = result {
        warn!(tool, code = e.code(), %e, "tool call failed");
    }
    format::render(result)
}

fn get_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, RequestFault> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RequestFault::InvalidParam(key.to_string(), "a string"))
}

/// Snowflakes are normally strings, but integers are accepted too.
fn get_id(args: &Value, key: &str) -> Result<String, RequestFault> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v) if v.is_u64() => Ok(v.to_string()),
        _ => Err(RequestFault::InvalidParam(key.to_string(), "a string")),
    }
}

/// Any JSON number is accepted. Values past the cap clamp to it and
/// fractions are truncated.
fn get_limit(args: &Value) -> Result<i64, RequestFault> {
    let v = match args.get("limit") {
        None | Some(Value::Null) => return Ok(DEFAULT_READ_LIMIT),
        Some(v) => v,
    };
    if let Some(n) = v.as_i64() {
        return Ok(n);
    }
    if v.is_u64() {
        return Ok(MAX_READ_LIMIT);
    }
    v.as_f64()
        .map(|f| f.min(MAX_READ_LIMIT as f64) as i64)
        .ok_or_else(|| RequestFault::InvalidParam("limit".to_string(), "a number"))
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<RpcResponse>) -> io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(resp) = rx.recv().await {
        write_response(&mut writer, &resp).await?;
    }
    Ok(writer)
}

async fn write_response<W>(writer: &mut W, resp: &RpcResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(resp)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use switchboard_domain::{Channel, ChannelHandle, ChannelKind, ChatGateway, Identity, Message};
    use switchboard_messaging::AllowList;

    #[derive(Default)]
    struct FakeGateway {
        sends: Mutex<Vec<(String, String)>>,
        fetch_limits: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl ChatGateway for FakeGateway {
        async fn current_user(&self) -> Result<Identity, BridgeError> {
            Ok(Identity {
                id: "1".to_string(),
                username: "bot".to_string(),
            })
        }

        async fn fetch_channel(
            &self,
            channel_id: &str,
        ) -> Result<Option<ChannelHandle>, BridgeError> {
            let kind = match channel_id {
                "111" | "222" => ChannelKind::Text,
                "400" => ChannelKind::Category,
                _ => return Ok(None),
            };
            Ok(Some(ChannelHandle {
                id: channel_id.to_string(),
                kind,
                archived: false,
                locked: false,
            }))
        }

        async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BridgeError> {
            self.sends
                .lock()
                .unwrap()
                .push((channel_id.to_string(), text.to_string()));
            Ok("900".to_string())
        }

        async fn fetch_recent_messages(
            &self,
            _channel_id: &str,
            limit: i64,
        ) -> Result<Vec<Message>, BridgeError> {
            self.fetch_limits.lock().unwrap().push(limit);
            Ok((1..=5)
                .rev()
                .map(|n| Message {
                    id: n.to_string(),
                    author: "alice".to_string(),
                    content: format!("msg {n}"),
                    timestamp: "2024-05-01T12:00:00.000Z".to_string(),
                    attachments: Vec::new(),
                })
                .collect())
        }

        async fn list_text_channels(&self) -> Result<Vec<Channel>, BridgeError> {
            Ok(vec![Channel {
                id: "111".to_string(),
                name: "general".to_string(),
                guild: "Home".to_string(),
                kind: ChannelKind::Text,
            }])
        }
    }

    fn server(allow: &str) -> (Arc<McpServer>, Arc<FakeGateway>) {
        let gateway = Arc::new(FakeGateway::default());
        let service = ChatService::new(gateway.clone(), AllowList::from_csv(allow));
        (
            Arc::new(McpServer::new(service, ToolRegistry::new())),
            gateway,
        )
    }

    async fn exchange(server: Arc<McpServer>, requests: &[Value]) -> Vec<Value> {
        let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
        let output = server.serve(input.as_bytes(), Vec::new()).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    async fn call(server: Arc<McpServer>, name: &str, arguments: Value) -> Value {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        });
        let mut responses = exchange(server, &[request]).await;
        assert_eq!(responses.len(), 1);
        responses.remove(0)
    }

    fn text_of(resp: &Value) -> &str {
        let content = resp["result"]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        content[0]["text"].as_str().unwrap()
    }

    #[tokio::test]
    async fn lists_three_tools() {
        let (srv, _) = server("");
        let resp = exchange(
            srv,
            &[json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"})],
        )
        .await;
        let tools = resp[0]["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            ["send_discord_message", "read_discord_messages", "list_discord_channels"]
        );
        assert_eq!(resp[0]["id"], 7);
    }

    #[tokio::test]
    async fn send_to_allowed_channel_returns_receipt() {
        let (srv, gw) = server("111");
        let resp = call(srv, "send_discord_message", json!({"channel_id": "111", "message": "hi"})).await;
        let payload: Value = serde_json::from_str(text_of(&resp)).unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["channel_id"], "111");
        assert_eq!(payload["content"], "hi");
        assert_eq!(payload["message_id"], "900");
        assert_eq!(gw.sends.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_outside_allow_list_is_error_text() {
        let (srv, gw) = server("111");
        let resp = call(srv, "send_discord_message", json!({"channel_id": "222", "message": "hi"})).await;
        assert!(resp.get("error").is_none());
        assert_eq!(
            text_of(&resp),
            "Error: Channel 222 is not in the allowed channels list"
        );
        assert!(gw.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_to_non_text_channel_is_error_text() {
        let (srv, _) = server("");
        let resp = call(srv, "send_discord_message", json!({"channel_id": "400", "message": "hi"})).await;
        assert_eq!(text_of(&resp), "Error: Invalid channel or not a text channel");
    }

    #[tokio::test]
    async fn read_caps_limit_and_orders_oldest_first() {
        let (srv, gw) = server("");
        let resp = call(srv, "read_discord_messages", json!({"channel_id": "111", "limit": 250})).await;
        assert_eq!(gw.fetch_limits.lock().unwrap().as_slice(), &[100]);

        let payload: Value = serde_json::from_str(text_of(&resp)).unwrap();
        assert_eq!(payload["channel_id"], "111");
        let ids: Vec<&str> = payload["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn read_clamps_float_and_huge_limits() {
        let (srv, gw) = server("");
        let lines: Vec<Value> = [json!(250.0), json!(u64::MAX), json!(1e3), json!(20.5)]
            .into_iter()
            .enumerate()
            .map(|(i, limit)| {
                json!({
                    "jsonrpc": "2.0", "id": i, "method": "tools/call",
                    "params": { "name": "read_discord_messages", "arguments": {"channel_id": "111", "limit": limit} }
                })
            })
            .collect();
        let responses = exchange(srv, &lines).await;

        assert_eq!(responses.len(), 4);
        for resp in &responses {
            assert!(resp.get("error").is_none(), "unexpected fault: {resp}");
        }
        let mut limits = gw.fetch_limits.lock().unwrap().clone();
        limits.sort_unstable();
        assert_eq!(limits, [20, 100, 100, 100]);
    }

    #[tokio::test]
    async fn read_defaults_to_ten() {
        let (srv, gw) = server("");
        call(srv, "read_discord_messages", json!({"channel_id": 111})).await;
        assert_eq!(gw.fetch_limits.lock().unwrap().as_slice(), &[10]);
    }

    #[tokio::test]
    async fn list_returns_channels() {
        let (srv, _) = server("");
        let resp = call(srv, "list_discord_channels", json!({})).await;
        let payload: Value = serde_json::from_str(text_of(&resp)).unwrap();
        assert_eq!(payload["channels"][0]["name"], "general");
        assert_eq!(payload["channels"][0]["guild"], "Home");
        assert_eq!(payload["channels"][0]["type"], 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_protocol_fault() {
        let (srv, _) = server("");
        let resp = call(srv, "frobnicate", json!({})).await;
        assert!(resp.get("result").is_none());
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
        assert_eq!(resp["error"]["message"], "unknown tool: frobnicate");
    }

    #[tokio::test]
    async fn missing_arguments_are_protocol_faults() {
        let (srv, gw) = server("");
        let no_args = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "list_discord_channels" }
        });
        let missing_param = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "send_discord_message", "arguments": {"channel_id": "111"} }
        });
        let bad_limit = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": { "name": "read_discord_messages", "arguments": {"channel_id": "111", "limit": "lots"} }
        });
        let responses = exchange(srv, &[no_args, missing_param, bad_limit]).await;
        assert_eq!(responses.len(), 3);

        let by_id = |id: i64| responses.iter().find(|r| r["id"] == id).unwrap();
        assert_eq!(by_id(1)["error"]["message"], "no arguments provided");
        assert_eq!(by_id(2)["error"]["message"], "missing 'message' parameter");
        assert_eq!(by_id(3)["error"]["message"], "'limit' must be a number");
        assert!(gw.sends.lock().unwrap().is_empty());
        assert!(gw.fetch_limits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn protocol_housekeeping() {
        let (srv, _) = server("");
        let responses = exchange(
            srv,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
                json!({"jsonrpc": "1.0", "id": 3, "method": "ping"}),
                json!({"jsonrpc": "2.0", "id": 4, "method": "resources/list"}),
            ],
        )
        .await;
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "switchboard");
        assert_eq!(responses[1]["result"], json!({}));
        assert_eq!(responses[2]["error"]["code"], INVALID_REQUEST);
        assert_eq!(responses[3]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn garbage_line_is_parse_error() {
        let (srv, _) = server("");
        let output = srv.serve(&b"not json\n\n"[..], Vec::new()).await.unwrap();
        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        let resp: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(resp["error"]["code"], PARSE_ERROR);
        assert_eq!(resp["id"], Value::Null);
    }

    #[tokio::test]
    async fn concurrent_calls_all_answer() {
        let (srv, gw) = server("");
        let requests: Vec<Value> = (1..=8)
            .map(|id| {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": "tools/call",
                    "params": {
                        "name": "send_discord_message",
                        "arguments": {"channel_id": "111", "message": format!("n{id}")}
                    }
                })
            })
            .collect();
        let responses = exchange(srv, &requests).await;
        assert_eq!(responses.len(), 8);
        for id in 1..=8 {
            assert!(responses.iter().any(|r| r["id"] == id));
        }
        assert_eq!(gw.sends.lock().unwrap().len(), 8);
    }
}
