use serde_json::json;

use super::types::{ToolDef, ToolKind};

pub const SEND_MESSAGE: &str = "send_discord_message";
pub const READ_MESSAGES: &str = "read_discord_messages";
pub const LIST_CHANNELS: &str = "list_discord_channels";

/// The fixed tool catalog. Built once at startup and never mutated.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: discord_tools(),
        }
    }

    pub fn definitions(&self) -> &[ToolDef] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.name == name)
    }
}

fn channel_id_param(description: &str) -> serde_json::Value {
    json!({
        "type": "string",
        "description": description
    })
}

fn discord_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: SEND_MESSAGE,
            description: "Send a message to a Discord channel. Only channels in the configured allow-list can receive messages; when no allow-list is set every channel the bot can see is writable.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel_id": channel_id_param("The Discord channel ID to send the message to"),
                    "message": {
                        "type": "string",
                        "description": "The message content to send"
                    }
                },
                "required": ["channel_id", "message"]
            }),
            kind: ToolKind::SendMessage,
        },
        ToolDef {
            name: READ_MESSAGES,
            description: "Read recent messages from a Discord channel. Messages are returned oldest first, with author, content, timestamp and attachment URLs.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel_id": channel_id_param("The Discord channel ID to read messages from"),
                    "limit": {
                        "type": "number",
                        "description": "Number of messages to fetch (default 10, max 100)",
                        "default": 10
                    }
                },
                "required": ["channel_id"]
            }),
            kind: ToolKind::ReadMessages,
        },
        ToolDef {
            name: LIST_CHANNELS,
            description: "List all text channels the bot can access, across every server (guild) it is a member of.",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
            kind: ToolKind::ListChannels,
        },
    ]
}
