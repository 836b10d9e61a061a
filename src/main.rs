//! Livechat CLI: watch a YouTube live chat or post to it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use livechat::config::{load_config, runtime_paths, Config, RuntimePaths};
use livechat::credentials::{
    is_token_expired, load_credentials, OAuthCredentialProvider, OAuthToken,
};
use livechat::engine::{ChatEngine, ChatEvent, EngineConfig};
use livechat::logging;
use livechat::youtube::types::LiveChatMessage;

/// Watch and post to a YouTube live chat.
#[derive(Debug, Parser)]
#[command(name = "livechat", version, about)]
struct Cli {
    /// Path to config.toml (default: ~/.livechat/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print live chat messages until Ctrl-C.
    Watch,
    /// Post one message to the live chat.
    Send {
        /// Message text.
        text: String,
    },
    /// Show resolved paths and credential state.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = runtime_paths()?;
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_toml.clone());

    match cli.command {
        Command::Watch => {
            let _guard = logging::init_production(&paths.logs_dir)?;
            let config = load_config(&config_path)?;
            watch(&paths, &config).await
        }
        Command::Send { text } => {
            logging::init_cli();
            let config = load_config(&config_path)?;
            send(&paths, &config, &text).await
        }
        Command::Status => {
            logging::init_cli();
            status(&paths, &config_path);
            Ok(())
        }
    }
}

fn build_engine(paths: &RuntimePaths, config: &Config) -> Result<ChatEngine> {
    let credentials = load_credentials(&paths.env_file).context("failed to load credentials")?;
    let provider = Arc::new(OAuthCredentialProvider::new(credentials, config.api.clone()));
    Ok(ChatEngine::new(provider, EngineConfig::from(&config.polling)))
}

async fn watch(paths: &RuntimePaths, config: &Config) -> Result<()> {
    let engine = build_engine(paths, config)?;
    let mut events = engine.events().stream();

    engine.connect().await.context("failed to connect")?;
    if !engine.is_connected() {
        println!("no live chat is active");
        return Ok(());
    }
    info!(feed_id = ?engine.feed_id(), "watching live chat, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            item = events.next() => match item {
                Some(Ok(ChatEvent::MessagesReceived(batch))) => {
                    for message in &batch.messages {
                        print_message(message);
                    }
                }
                Some(Ok(ChatEvent::PollingFailed { error })) => {
                    error!(error = %error, "polling stopped");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => warn!(error = %err, "event stream lagged"),
                None => break,
            }
        }
    }

    engine.disconnect().await?;
    Ok(())
}

async fn send(paths: &RuntimePaths, config: &Config, text: &str) -> Result<()> {
    let engine = build_engine(paths, config)?;
    engine.connect().await.context("failed to connect")?;

    let outcome = engine.send_message(text).await;
    engine.disconnect().await?;

    match outcome? {
        Some(message) => println!("sent {}", message.id),
        None => println!("not sent: no live chat is active"),
    }
    Ok(())
}

fn status(paths: &RuntimePaths, config_path: &std::path::Path) {
    println!("config:      {}", config_path.display());
    match load_config(config_path) {
        Ok(_) => println!("             ok"),
        Err(err) => println!("             invalid: {err:#}"),
    }

    println!("credentials: {}", paths.env_file.display());
    match load_credentials(&paths.env_file) {
        Ok(credentials) => match OAuthToken::from_credentials(&credentials) {
            Ok(token) if is_token_expired(&token) => {
                println!("             access token expired or missing, will refresh");
            }
            Ok(_) => println!("             access token valid"),
            Err(err) => println!("             {err}"),
        },
        Err(err) => println!("             unavailable: {err:#}"),
    }

    println!("logs:        {}", paths.logs_dir.display());
}

fn print_message(message: &LiveChatMessage) {
    let author = message.author_name().unwrap_or("unknown");
    let text = message.text().unwrap_or_default();
    println!("{author}: {text}");
}
