mod config;
mod mcp;

use std::env;
use std::sync::Arc;

use config::BridgeConfig;
use switchboard_discord::{DiscordAdapter, DiscordConfig};
use switchboard_domain::ChatGateway;
use switchboard_messaging::ChatService;
use tracing::{error, info};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("switchboard=info")),
        )
        .compact()
        .init();
}

async fn connect(config: DiscordConfig) -> Result<DiscordAdapter, Box<dyn std::error::Error>> {
    let (adapter, me) = DiscordAdapter::connect(config).await?;
    info!(user = %me.username, id = %me.id, "logged in to discord");
    Ok(adapter)
}

async fn run_mcp_server() -> Result<(), Box<dyn std::error::Error>> {
    let BridgeConfig {
        discord,
        allow_list,
    } = BridgeConfig::from_env()?;
    let adapter = connect(discord).await?;

    if allow_list.is_open() {
        info!("no channel allow-list configured, every channel is writable");
    } else {
        info!(channels = allow_list.len(), "channel allow-list loaded");
    }

    let service = ChatService::new(Arc::new(adapter), allow_list);
    let server = Arc::new(mcp::McpServer::new(service, mcp::ToolRegistry::new()));
    server.run().await
}

async fn run_list_channels() -> Result<(), Box<dyn std::error::Error>> {
    let BridgeConfig {
        discord,
        allow_list,
    } = BridgeConfig::from_env()?;
    let adapter = connect(discord).await?;
    let channels = adapter.list_text_channels().await?;

    eprintln!("Text channels visible to the bot:");
    eprintln!();
    for ch in &channels {
        let marker = if allow_list.is_channel_allowed(&ch.id) {
            "writable"
        } else {
            "read-only"
        };
        eprintln!("  • {ch} [{marker}]");
    }
    eprintln!();
    eprintln!("Add channel IDs to {} to restrict sending", config::ALLOW_LIST_VAR);

    Ok(())
}

fn print_help() {
    eprintln!("Switchboard — Discord tools for MCP agents");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  switchboard mcp        Start MCP server (stdio)");
    eprintln!("  switchboard channels   List text channels the bot can see");
    eprintln!("  switchboard help       Show this help");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  DISCORD_BOT_TOKEN      Discord bot token (required)");
    eprintln!("  ALLOWED_CHANNEL_IDS    Comma-separated channel IDs that may receive messages");
    eprintln!("                         (unset: every channel is writable)");
    eprintln!("  DISCORD_API_BASE       API base URL (default: https://discord.com/api/v10)");
    eprintln!("  SWITCHBOARD_ENV_FILE   dotenv file to load (default: ./.env)");
    eprintln!("  RUST_LOG               Log level (default: switchboard=info)");
}

#[tokio::main]
async fn main() {
    let env_file = config::load_env_file();
    init_tracing();

    match env_file {
        Ok(Some(path)) => info!(path = %path.display(), "loaded env file"),
        Ok(None) => {}
        Err(e) => {
            error!(%e, "fatal error");
            std::process::exit(1);
        }
    }

    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("mcp");

    let result = match cmd {
        "mcp" => run_mcp_server().await,
        "channels" => run_list_channels().await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        unknown => {
            eprintln!("Unknown command: {unknown}");
            eprintln!("Run `switchboard help` for usage");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!(%e, "fatal error");
        std::process::exit(1);
    }
}
