use thiserror::Error;

/// Every failure a tool handler can hit. The `Display` text is what the
/// calling agent sees after the `Error: ` prefix, so keep messages readable.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Channel {0} is not in the allowed channels list")]
    ChannelNotAllowed(String),

    #[error("Invalid channel or not a text channel")]
    InvalidChannel,

    #[error("Channel does not support sending messages")]
    NotSendable,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn channel_not_allowed(channel_id: impl Into<String>) -> Self {
        Self::ChannelNotAllowed(channel_id.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable identifier for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChannelNotAllowed(_) => "CHANNEL_NOT_ALLOWED",
            Self::InvalidChannel => "INVALID_CHANNEL",
            Self::NotSendable => "NOT_SENDABLE",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Api(_) => "API_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
