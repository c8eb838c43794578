mod core;
mod services;
mod ui;

use std::env;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::*;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::config::{
    load_settings, resolve_api_key, Paths, API_KEY_NAME, DEFAULT_BASE_URL, LOG_FILE,
};
use crate::core::history::InteractionHistory;
use crate::core::shell::Shell;
use crate::services::ChatCompletionProcessor;
use crate::ui::setup::{request_api_key, SetupPrompt};
use crate::ui::terminal::ElectronTerminal;

#[derive(Parser)]
#[command(name = "electron")]
#[command(version, about = "A command line AI assistant")]
struct Cli {
    /// Directory holding settings.json, history.jsonl and electron.log
    #[arg(long, env = "ELECTRON_HOME")]
    home: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "ELECTRON_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Message to send as soon as the session starts
    #[arg(trailing_var_arg = true)]
    message: Vec<String>,
}

fn init_logging(home: &Path) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(home, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Paths::new(cli.home.unwrap_or_else(Paths::default_home));
    paths.ensure_home()?;
    let guard = init_logging(&paths.home);
    info!("Starting session in '{}'", paths.home.display());

    let settings = load_settings(&paths.settings())?;
    let api_key = match resolve_api_key(&settings, env::var(API_KEY_NAME).ok()) {
        Ok(key) => key,
        Err(e) => {
            warn!("{}", e);
            let mut prompt = SetupPrompt::new()?;
            match request_api_key(&mut prompt, &paths.settings())? {
                Some(key) => key,
                None => {
                    eprintln!("\n{}", "Set your API key and try again.".red().bold());
                    drop(guard);
                    std::process::exit(1);
                }
            }
        }
    };

    let history = InteractionHistory::open(paths.history())?;
    let processor = ChatCompletionProcessor::new(
        &settings.model,
        api_key,
        cli.base_url,
        settings.system_prompt(),
    );
    let shell = Shell::new(settings, history, processor);
    let mut terminal = ElectronTerminal::new(shell)?;

    let first_message = Some(cli.message.join(" "));
    terminal.run(first_message).await?;

    info!("Session finished.");
    Ok(())
}
