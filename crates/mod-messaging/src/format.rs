use serde::Serialize;
use switchboard_domain::{Channel, Message};
use switchboard_error::BridgeError;

#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub success: bool,
    pub message_id: String,
    pub channel_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageHistory {
    pub channel_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelDirectory {
    pub channels: Vec<Channel>,
}

/// Collapse a handler outcome into the single text block returned to the
/// caller: pretty JSON on success, `Error: <message>` otherwise.
pub fn render<T: Serialize>(result: Result<T, BridgeError>) -> String {
    match result.and_then(|payload| to_json(&payload)) {
        Ok(text) => text,
        Err(e) => render_error(&e),
    }
}

pub fn render_error(err: &BridgeError) -> String {
    format!("Error: {err}")
}

fn to_json<T: Serialize>(payload: &T) -> Result<String, BridgeError> {
    serde_json::to_string_pretty(payload)
        .map_err(|e| BridgeError::internal(format!("failed to encode result: {e}")))
}
