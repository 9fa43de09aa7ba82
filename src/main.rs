use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod config;
mod elements;
mod handler;
mod markup;
mod message_log;
mod tui;
mod ui;
mod widget;

use app::App;
use client::{ChatClient, ChatRequest, ChatTransport};
use config::Config;
use elements::ChatElements;
use widget::{ChatWidget, MarkupTrust, WARNING_TEXT};

#[derive(Parser)]
#[command(name = "intent-chat", version)]
#[command(about = "Chat with an intent-classifying endpoint from the terminal")]
struct Cli {
    /// Base URL of the chat server (overrides the config file)
    #[arg(short, long)]
    endpoint: Option<String>,
    /// Model to select at startup, passed to the server as-is
    #[arg(short, long)]
    model: Option<String>,
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Escape intent and response text from the server instead of rendering its markup
    #[arg(long)]
    escape_server_markup: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Send {
        /// Message text
        text: String,
    },
    /// Clear the server's conversation history
    Reset,
}

/// Log to a file: the terminal belongs to the UI.
fn init_tracing() -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("intent-chat");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("intent-chat.log");
    let file = File::options().create(true).append(true).open(&log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = init_tracing()?;

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => Config::get_config_path()?,
    };
    let config = Config::load_from(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let endpoint = cli.endpoint.clone().unwrap_or_else(|| config.endpoint().to_string());
    let model = cli.model.clone().unwrap_or_else(|| config.initial_model());
    let trust = if cli.escape_server_markup || config.escape_server_markup {
        MarkupTrust::AlwaysEscape
    } else {
        MarkupTrust::TrustServer
    };
    info!(%endpoint, %model, ?trust, log = %log_path.display(), "starting intent-chat");

    let client = ChatClient::new(&endpoint);

    match cli.command {
        Some(Commands::Send { text }) => send_once(&client, &text, &model, trust).await,
        Some(Commands::Reset) => reset_once(&client).await,
        None => run_tui(client, config, config_path, &model, trust).await,
    }
}

async fn send_once(client: &ChatClient, text: &str, model: &str, trust: MarkupTrust) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let request = ChatRequest { text: text.to_string(), model: model.to_string() };
    match client.chat(&request).await {
        Ok(reply) => {
            println!("{}", markup::to_plain(&widget::format_reply(&reply, trust)));
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "chat request failed");
            Err(err).with_context(|| format!("{} chat request to {} failed", WARNING_TEXT, client.base_url()))
        }
    }
}

async fn reset_once(client: &ChatClient) -> Result<()> {
    let reply = client
        .reset()
        .await
        .with_context(|| format!("reset request to {} failed", client.base_url()))?;
    println!("{}", reply.message.unwrap_or_default());
    Ok(())
}

async fn run_tui(
    client: ChatClient,
    config: Config,
    config_path: PathBuf,
    model: &str,
    trust: MarkupTrust,
) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let elements = ChatElements::new(config.models.clone(), model);
    let widget = ChatWidget::attach(elements, Arc::new(client), events.sender(), trust);
    let mut app = App::new(widget, Some(config_path));

    let result: Result<()> = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok(())
    }
    .await;

    tui::restore()?;
    info!("intent-chat exiting");
    result
}
