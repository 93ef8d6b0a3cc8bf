use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use newsdesk::config::Config;
use newsdesk::TurnSession;

use crate::logging::setup_logging;
use crate::session::ChatSession;

/// Secrets the session needs, checked once at startup
const CREDENTIAL_KEYS: &[&str] = &["OPENAI_API_KEY", "NEWS_API_KEY", "BRAVE_API_KEY"];

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Also write logs to stderr")]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Start an interactive news conversation")]
    Chat {},

    #[command(about = "Ask one question and print the answer")]
    Ask {
        #[arg(help = "The message, e.g. \"Show me today's news\" or \"./ fashion\"")]
        message: String,
    },
}

fn log_credentials(config: &Config) {
    for key in CREDENTIAL_KEYS {
        let set = config.get_secret::<String>(key).is_ok();
        info!(key, set, "credential");
    }
}

pub async fn cli() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to read .env file: {}", e);
        }
    }
    setup_logging(cli.debug)?;

    let config = Config::global();
    info!(config = %config.path(), "starting newsdesk");
    log_credentials(config);

    let mut chat = ChatSession::new(TurnSession::from_config(config)?);
    match cli.command {
        Some(Command::Ask { message }) => chat.headless(&message).await,
        Some(Command::Chat {}) | None => chat.interactive().await,
    }
}
