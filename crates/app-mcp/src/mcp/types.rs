use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Deserialize)]
pub struct RpcMessage {
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: Option<String>,
    pub params: Option<Value>,
}

impl RpcMessage {
    pub fn is_valid_jsonrpc(&self) -> bool {
        self.jsonrpc.as_deref() == Some("2.0")
    }
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, code: i32, msg: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: msg.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SendMessage,
    ReadMessages,
    ListChannels,
}

#[derive(Debug, Serialize)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(skip)]
    pub kind: ToolKind,
}

impl ToolDef {
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.input_schema["required"]
            .as_array()
            .map_or(&[] as &[Value], |v| v)
            .iter()
            .filter_map(|v| v.as_str())
    }
}

/// Result of a tool call. Always exactly one text block; handler failures
/// travel here as `Error: ...` text, not as JSON-RPC errors.
#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub content: [Content; 1],
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolResult {
    pub fn text(text: String) -> Self {
        Self {
            content: [Content::Text { text }],
        }
    }

    pub fn as_text(&self) -> &str {
        let [Content::Text { text }] = &self.content;
        text
    }
}

#[derive(Deserialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Option<Value>,
}

/// A call the dispatcher refuses before any handler runs. These surface as
/// JSON-RPC errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestFault {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("no arguments provided")]
    MissingArguments,

    #[error("missing '{0}' parameter")]
    MissingParam(String),

    #[error("'{0}' must be {1}")]
    InvalidParam(String, &'static str),
}

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
