use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use switchboard_domain::*;
use switchboard_error::BridgeError;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";

const GUILD_PAGE_SIZE: usize = 200;

pub struct DiscordConfig {
    pub bot_token: String,
    pub base_url: String,
}

pub struct DiscordAdapter {
    auth: String,
    base_url: String,
    client: Client,
}

impl DiscordAdapter {
    pub fn new(config: DiscordConfig) -> Self {
        let auth = format!("Bot {}", config.bot_token);
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let client = Client::new();
        Self {
            auth,
            base_url,
            client,
        }
    }

    /// Build the adapter and prove the token works. The returned identity is
    /// the bot user the session acts as.
    pub async fn connect(config: DiscordConfig) -> Result<(Self, Identity), BridgeError> {
        let adapter = Self::new(config);
        let me = adapter.current_user().await?;
        Ok((adapter, me))
    }

    /// Discord ids are snowflakes: a non-empty run of ASCII digits. Anything
    /// else could rewrite the request path or query.
    fn validate_id(id: &str, label: &str) -> Result<(), BridgeError> {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BridgeError::invalid_input(format!(
                "invalid {label}: must be a numeric snowflake id"
            )));
        }
        Ok(())
    }

    async fn api_get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, BridgeError> {
        match self.api_get_optional(path, query).await? {
            Some(body) => Ok(body),
            None => Err(parse_discord_error(404, "not found")),
        }
    }

    /// Like `api_get`, but a 404 is `Ok(None)` instead of an error.
    async fn api_get_optional(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, BridgeError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url, "discord GET");
        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth)
            .query(query)
            .send()
            .await
            .map_err(|e| BridgeError::network(format!("discord request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(resp).await.map(Some)
    }

    async fn api_post(&self, path: &str, body: &Value) -> Result<Value, BridgeError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url, "discord POST");
        let resp = self
            .client
            .post(&url)
            .header("Authorization", &self.auth)
            .json(body)
            .send()
            .await
            .map_err(|e| BridgeError::network(format!("discord request failed: {e}")))?;

        read_json(resp).await
    }

    async fn list_guilds(&self) -> Result<Vec<(String, String)>, BridgeError> {
        let mut guilds = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("limit", GUILD_PAGE_SIZE.to_string())];
            if let Some(ref id) = after {
                query.push(("after", id.clone()));
            }

            let page = self.api_get("/users/@me/guilds", &query).await?;
            let arr = page
                .as_array()
                .ok_or_else(|| BridgeError::api("discord: expected guilds array"))?;

            for g in arr {
                let id = g["id"].as_str().unwrap_or("").to_string();
                let name = g["name"].as_str().unwrap_or("Unknown").to_string();
                guilds.push((id, name));
            }

            if arr.len() < GUILD_PAGE_SIZE {
                break;
            }
            after = guilds.last().map(|(id, _)| id.clone());
        }

        Ok(guilds)
    }
}

/// Status is checked before the body is decoded, so an error page that is
/// not JSON still reports its status.
async fn read_json(resp: reqwest::Response) -> Result<Value, BridgeError> {
    let status = resp.status();
    if !status.is_success() {
        let body: Value = resp
            .json()
            .await
            .unwrap_or_else(|_| serde_json::json!({ "message": "unknown error" }));
        let msg = body["message"].as_str().unwrap_or("unknown error");
        return Err(parse_discord_error(status.as_u16(), msg));
    }

    resp.json()
        .await
        .map_err(|e| BridgeError::api(format!("discord response parse failed: {e}")))
}

#[async_trait]
impl ChatGateway for DiscordAdapter {
    async fn current_user(&self) -> Result<Identity, BridgeError> {
        let user = self.api_get("/users/@me", &[]).await?;
        Ok(Identity {
            id: user["id"].as_str().unwrap_or("").to_string(),
            username: user["username"].as_str().unwrap_or("unknown").to_string(),
        })
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<ChannelHandle>, BridgeError> {
        Self::validate_id(channel_id, "channel_id")?;
        let resp = self
            .api_get_optional(&format!("/channels/{channel_id}"), &[])
            .await?;
        Ok(resp.map(|ch| parse_channel_handle(&ch)))
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BridgeError> {
        Self::validate_id(channel_id, "channel_id")?;
        let body = serde_json::json!({ "content": text });
        let resp = self
            .api_post(&format!("/channels/{channel_id}/messages"), &body)
            .await?;

        resp["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| BridgeError::api("discord: sent message has no id"))
    }

    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, BridgeError> {
        Self::validate_id(channel_id, "channel_id")?;
        let resp = self
            .api_get(
                &format!("/channels/{channel_id}/messages"),
                &[("limit", limit.to_string())],
            )
            .await?;

        let messages = resp
            .as_array()
            .map_or(&[] as &[Value], |v| v.as_slice())
            .iter()
            .map(parse_discord_message)
            .collect();
        Ok(messages)
    }

    async fn list_text_channels(&self) -> Result<Vec<Channel>, BridgeError> {
        let guilds = self.list_guilds().await?;

        let mut channels = Vec::new();
        for (guild_id, guild_name) in &guilds {
            Self::validate_id(guild_id, "guild_id")?;
            let guild_channels = self
                .api_get(&format!("/guilds/{guild_id}/channels"), &[])
                .await?;

            for ch in guild_channels.as_array().map_or(&[] as &[Value], |v| v.as_slice()) {
                let channel = parse_discord_channel(ch, guild_name);
                if channel.kind.is_text_based() {
                    channels.push(channel);
                } else {
                    debug!(id = %channel.id, kind = %channel.kind, "skipping non-text channel");
                }
            }
        }

        debug!(guilds = guilds.len(), channels = channels.len(), "enumerated channels");
        Ok(channels)
    }
}

/// A channel with no usable `type` is never treated as text-capable.
fn channel_kind(ch: &Value) -> ChannelKind {
    ch["type"].as_u64().map_or(ChannelKind::Other(u16::MAX), |code| {
        ChannelKind::from_code(u16::try_from(code).unwrap_or(u16::MAX))
    })
}

fn parse_channel_handle(ch: &Value) -> ChannelHandle {
    let meta = &ch["thread_metadata"];
    ChannelHandle {
        id: ch["id"].as_str().unwrap_or("").to_string(),
        kind: channel_kind(ch),
        archived: meta["archived"].as_bool().unwrap_or(false),
        locked: meta["locked"].as_bool().unwrap_or(false),
    }
}

fn parse_discord_channel(ch: &Value, guild_name: &str) -> Channel {
    Channel {
        id: ch["id"].as_str().unwrap_or("").to_string(),
        name: ch["name"].as_str().unwrap_or("unknown").to_string(),
        guild: guild_name.to_string(),
        kind: channel_kind(ch),
    }
}

fn parse_discord_message(m: &Value) -> Message {
    let author = m["author"]["global_name"]
        .as_str()
        .or_else(|| m["author"]["username"].as_str())
        .unwrap_or("unknown")
        .to_string();

    let attachments = m["attachments"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|a| a["url"].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    Message {
        id: m["id"].as_str().unwrap_or("").to_string(),
        author,
        content: m["content"].as_str().unwrap_or("").to_string(),
        timestamp: normalize_timestamp(m["timestamp"].as_str().unwrap_or("")),
        attachments,
    }
}

/// Discord reports `+00:00` offsets with microseconds; callers get
/// millisecond UTC with a `Z` suffix. Unparsable input is passed through.
fn normalize_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        })
        .unwrap_or_else(|_| raw.to_string())
}

fn parse_discord_error(status: u16, msg: &str) -> BridgeError {
    if status == 401 || status == 403 {
        return BridgeError::auth(format!("discord auth failed ({status}): {msg}"));
    }
    BridgeError::api(format!("discord api error ({status}): {msg}"))
}
