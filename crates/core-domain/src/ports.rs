use async_trait::async_trait;
use switchboard_error::BridgeError;

use crate::entities::{Channel, ChannelHandle, Identity, Message};

/// The remote chat platform, as seen by the tool handlers. Each method is one
/// round trip (listing may page through several).
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn current_user(&self) -> Result<Identity, BridgeError>;

    /// `Ok(None)` when the platform reports the channel does not exist.
    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<ChannelHandle>, BridgeError>;

    /// Returns the id of the sent message.
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BridgeError>;

    /// Newest first, exactly as the platform delivers them.
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, BridgeError>;

    /// Text-capable channels across every guild, in guild order then
    /// channel order.
    async fn list_text_channels(&self) -> Result<Vec<Channel>, BridgeError>;
}
