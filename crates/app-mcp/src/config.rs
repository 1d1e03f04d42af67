use std::env;
use std::path::PathBuf;

use switchboard_discord::{DiscordConfig, DEFAULT_BASE_URL};
use switchboard_messaging::AllowList;
use thiserror::Error;

pub const TOKEN_VAR: &str = "DISCORD_BOT_TOKEN";
pub const ALLOW_LIST_VAR: &str = "ALLOWED_CHANNEL_IDS";
pub const API_BASE_VAR: &str = "DISCORD_API_BASE";
pub const ENV_FILE_VAR: &str = "SWITCHBOARD_ENV_FILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DISCORD_BOT_TOKEN env var not set")]
    MissingToken,

    #[error("failed to load {path}: {reason}")]
    EnvFile { path: String, reason: String },
}

pub struct BridgeConfig {
    pub discord: DiscordConfig,
    pub allow_list: AllowList,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup(TOKEN_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let base_url = lookup(API_BASE_VAR)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let allow_list = lookup(ALLOW_LIST_VAR)
            .map(|raw| AllowList::from_csv(&raw))
            .unwrap_or_default();

        Ok(Self {
            discord: DiscordConfig {
                bot_token,
                base_url,
            },
            allow_list,
        })
    }
}

/// Seed the process environment from a dotenv file. Variables already set
/// win. Returns the path that was loaded, if any.
pub fn load_env_file() -> Result<Option<PathBuf>, ConfigError> {
    let path = env::var_os(ENV_FILE_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".env"));
    if !path.is_file() {
        return Ok(None);
    }

    dotenvy::from_path(&path).map_err(|e| ConfigError::EnvFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(path))
}
