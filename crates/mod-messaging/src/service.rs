use std::sync::Arc;

use switchboard_domain::ChatGateway;
use switchboard_error::BridgeError;
use tracing::{info, warn};

use crate::format::{ChannelDirectory, MessageHistory, SendReceipt};
use crate::policy::AllowList;

pub const DEFAULT_READ_LIMIT: i64 = 10;
pub const MAX_READ_LIMIT: i64 = 100;

pub struct ChatService {
    gateway: Arc<dyn ChatGateway>,
    allow_list: AllowList,
}

impl ChatService {
    pub fn new(gateway: Arc<dyn ChatGateway>, allow_list: AllowList) -> Self {
        Self {
            gateway,
            allow_list,
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<SendReceipt, BridgeError> {
        if !self.allow_list.is_channel_allowed(channel_id) {
            warn!(channel_id, "send rejected by allow-list");
            return Err(BridgeError::channel_not_allowed(channel_id));
        }

        let channel = self
            .gateway
            .fetch_channel(channel_id)
            .await?
            .filter(|ch| ch.is_text_based())
            .ok_or(BridgeError::InvalidChannel)?;
        if !channel.can_send() {
            return Err(BridgeError::NotSendable);
        }

        let message_id = self.gateway.send_message(&channel.id, text).await?;
        info!(channel_id, %message_id, "sent message");

        Ok(SendReceipt {
            success: true,
            message_id,
            channel_id: channel_id.to_string(),
            content: text.to_string(),
        })
    }

    /// Only the upper bound is enforced on `limit`; zero or negative values
    /// reach the platform unchanged.
    pub async fn read_messages(
        &self,
        channel_id: &str,
        limit: i64,
    ) -> Result<MessageHistory, BridgeError> {
        let channel = self
            .gateway
            .fetch_channel(channel_id)
            .await?
            .filter(|ch| ch.is_text_based())
            .ok_or(BridgeError::InvalidChannel)?;

        let limit = limit.min(MAX_READ_LIMIT);
        let mut messages = self
            .gateway
            .fetch_recent_messages(&channel.id, limit)
            .await?;
        messages.reverse();
        info!(channel_id, limit, count = messages.len(), "read messages");

        Ok(MessageHistory {
            channel_id: channel_id.to_string(),
            messages,
        })
    }

    pub async fn list_channels(&self) -> Result<ChannelDirectory, BridgeError> {
        let channels = self.gateway.list_text_channels().await?;
        info!(count = channels.len(), "listed channels");
        Ok(ChannelDirectory { channels })
    }
}
