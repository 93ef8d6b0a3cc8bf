use std::path::PathBuf;

use anyhow::{Context, Result};
use etcetera::{choose_app_strategy, AppStrategy};
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use newsdesk::config::APP_STRATEGY;

const DEFAULT_FILTER: &str = "newsdesk=info,newsdesk_cli=info";

/// Directory for rolled log files, e.g. `~/.local/state/newsdesk/logs`
pub fn log_dir() -> Result<PathBuf> {
    let strategy = choose_app_strategy(APP_STRATEGY.clone())
        .context("newsdesk requires a home directory")?;
    let dir = strategy
        .in_state_dir("logs")
        .unwrap_or_else(|| strategy.data_dir().join("logs"));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    Ok(dir)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// JSON lines to a daily file always; human-readable stderr output only with `--debug`.
pub fn setup_logging(debug: bool) -> Result<()> {
    let file_appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix("newsdesk")
        .filename_suffix("log")
        .build(log_dir()?)
        .context("failed to create log file appender")?;

    let file_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_writer(file_appender)
        .with_filter(env_filter());

    let console_layer = debug.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(env_filter())
    });

    Registry::default()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
