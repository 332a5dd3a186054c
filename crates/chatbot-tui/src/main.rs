use anyhow::{bail, Result};
use chatbot_core::{
    config::SERVER_URL_ENV, Config, HttpBackend, Message, PathPicker, RejectReason, Sender,
    SessionController, TurnOutcome,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing::info;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "chatbot")]
#[command(about = "Chat with an LLM server from the terminal", version)]
struct Cli {
    /// Chat server base URL (overrides $CHATBOT_SERVER_URL and the config file)
    #[arg(short, long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Send {
        /// Message text
        text: String,
    },
    /// Upload one file and print the server's answer
    Upload {
        /// File to upload
        path: PathBuf,
    },
    /// Show the effective settings, or save a server URL
    Config {
        /// Persist this server URL to the config file
        #[arg(long)]
        set_server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?.with_overrides(std::env::var(SERVER_URL_ENV).ok(), cli.server);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_tui(&config).await,
        Commands::Send { text } => {
            logging::init_stderr();
            let session = SessionController::new(HttpBackend::from_config(&config)?);
            let outcome = session.send_text(&text).await;
            print_messages(&session.messages());
            finish(outcome)
        }
        Commands::Upload { path } => {
            logging::init_stderr();
            let session = SessionController::new(HttpBackend::from_config(&config)?);
            let outcome = session.attach_from(&PathPicker::new(path)).await;
            print_messages(&session.messages());
            finish(outcome)
        }
        Commands::Config { set_server } => show_config(&config, set_server),
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    let _guard = logging::init_file()?;
    info!(server = %config.server_url(), "starting chat session");

    let session = SessionController::new(HttpBackend::from_config(config)?);
    let mut app = App::new(session);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_loop(&mut terminal, &mut app).await;
    tui::restore()?;

    info!("chat session ended");
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();
    let mut changes = app.session.subscribe();

    loop {
        terminal.draw(|frame| ui::render(app, frame))?;

        if app.should_quit {
            return Ok(());
        }

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => return Ok(()),
            },
            Ok(()) = changes.changed() => app.on_session_changed(),
        }
    }
}

fn print_messages(messages: &[Message]) {
    for msg in messages {
        let label = match (msg.sender(), msg.is_error()) {
            (Sender::User, _) => "You:".bold().cyan(),
            (Sender::Bot, false) => "Bot:".bold().yellow(),
            (Sender::Bot, true) => "Bot (error):".bold().red(),
        };
        println!("{}", label);

        if let Some(text) = msg.text() {
            if msg.is_error() {
                println!("{}", text.red());
            } else {
                println!("{}", text);
            }
        }
        if let Some(uri) = msg.attachment_uri() {
            println!("{}", uri.blue().underline());
        }
        println!();
    }
}

fn finish(outcome: TurnOutcome) -> Result<()> {
    match outcome {
        TurnOutcome::Replied | TurnOutcome::Cancelled => Ok(()),
        TurnOutcome::Failed => bail!("turn failed"),
        TurnOutcome::Rejected(RejectReason::EmptyInput) => bail!("nothing to send"),
        TurnOutcome::Rejected(RejectReason::Busy) => bail!("another request is still pending"),
    }
}

fn show_config(config: &Config, set_server: Option<String>) -> Result<()> {
    if let Some(url) = set_server {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("server URL must start with http:// or https://");
        }
        Config::save_server_url(url)?;
        println!("{} {}", "Saved server URL:".green(), url);
        return Ok(());
    }

    println!("{} {}", "Config file:".bold(), Config::config_path()?.display());
    println!("{} {}", "Server URL: ".bold(), config.server_url());
    match config.request_timeout() {
        Some(timeout) => println!("{} {}s", "Timeout:    ".bold(), timeout.as_secs()),
        None => println!("{} none", "Timeout:    ".bold()),
    }
    Ok(())
}
