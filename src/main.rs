//! Mystery Link - command line front end
//!
//! Joins a game room over WebSocket to follow its traffic or post a single
//! message.

use clap::{Args, Parser, Subcommand};
use mystery_link::config::ClientConfig;
use mystery_link::observability::init_default_logging;
use mystery_link::protocol::{message_types, ChatMessage, GameStatusUpdate, PlayerUpdate};
use mystery_link::MessagingClient;
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info, Instrument};

/// Real-time messaging client for murder-mystery game rooms
#[derive(Parser)]
#[command(name = "mystery-link")]
#[command(about = "Real-time messaging client for murder-mystery game rooms")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where to connect; overrides the `[server]` section
#[derive(Args, Debug, Default)]
struct EndpointArgs {
    /// WebSocket endpoint (ws:// or wss://)
    #[arg(long, env = "MYSTERY_LINK_URL")]
    url: Option<String>,

    /// Game room to join
    #[arg(long)]
    game_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a game room and log its chat, player and status messages
    Listen {
        #[command(flatten)]
        endpoint: EndpointArgs,
    },
    /// Send one message to a game room
    Send {
        /// Message type, e.g. chat
        #[arg(long = "type", value_name = "TYPE")]
        message_type: String,

        /// JSON payload for the data field
        #[arg(long, default_value = "{}")]
        data: String,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting mystery-link v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Listen { endpoint } => run_listen(config, endpoint).await,
        Commands::Send {
            message_type,
            data,
            endpoint,
        } => run_send(config, endpoint, &message_type, &data).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ClientConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["mystery-link.toml", "config/mystery-link.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(ClientConfig::load_from_file(&path)?);
                }
            }

            info!("No configuration file found, using built-in defaults");
            Ok(ClientConfig::default())
        }
    }
}

/// Apply command line overrides and return the address to connect to
fn resolve_endpoint(
    mut config: ClientConfig,
    overrides: EndpointArgs,
) -> Result<(ClientConfig, String), Box<dyn std::error::Error>> {
    if let Some(url) = overrides.url {
        config.server.url = url;
    }
    if overrides.game_id.is_some() {
        config.server.game_id = overrides.game_id;
    }
    config.validate()?;
    let address = config.endpoint()?;
    Ok((config, address))
}

async fn run_listen(
    config: ClientConfig,
    endpoint: EndpointArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, address) = resolve_endpoint(config, endpoint)?;
    let mut client = MessagingClient::from_config(&config)?;

    client.on_typed(message_types::CHAT, |chat: ChatMessage| {
        info!(sender = %chat.sender, "{}", chat.content);
        Ok(())
    })?;
    client.on_typed(message_types::PLAYER_UPDATE, |update: PlayerUpdate| {
        let names: Vec<&str> = update.players.iter().map(|p| p.name.as_str()).collect();
        info!(count = names.len(), "Players: {}", names.join(", "));
        Ok(())
    })?;
    client.on_typed(
        message_types::GAME_STATUS_UPDATE,
        |update: GameStatusUpdate| {
            info!("Game status: {}", update.status);
            Ok(())
        },
    )?;

    client
        .connect(&address)
        .instrument(mystery_link::lifecycle_span!(event = "startup"))
        .await?;
    info!("Listening on {} (Ctrl-C to stop)", address);

    let outcome: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Received Ctrl-C, shutting down gracefully...");
            Ok(())
        }
        reason = client.wait_for_failure() => {
            error!("Connection permanently lost: {}", reason);
            Err(reason.into())
        }
    };

    client.disconnect().await;
    outcome
}

async fn run_send(
    config: ClientConfig,
    endpoint: EndpointArgs,
    message_type: &str,
    data: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let data: Value = serde_json::from_str(data)?;
    let (config, address) = resolve_endpoint(config, endpoint)?;

    let mut client = MessagingClient::from_config(&config)?;
    client.connect(&address).await?;

    let sent = client.emit(message_type, &data);
    client.disconnect().await;
    sent?;

    info!(message_type = %message_type, "Message sent to {}", address);
    Ok(())
}

fn handle_config_command(
    config: &ClientConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
