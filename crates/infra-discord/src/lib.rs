mod adapter;

pub use adapter::{DiscordAdapter, DiscordConfig, DEFAULT_BASE_URL};
