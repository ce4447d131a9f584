use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragdesk_core::config::{self, Config};
use ragdesk_core::{ModelProvider, RagClient, TranscriptStore};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

/// Upload documents to a RAG backend and chat with them from the terminal.
#[derive(Parser)]
#[command(name = "ragdesk", version, about)]
struct Cli {
    /// Backend API root, e.g. http://localhost:8000/api
    #[arg(long, env = "RAGDESK_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Model provider to use (openai or bailian)
    #[arg(long, value_parser = parse_provider, global = true)]
    provider: Option<ModelProvider>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and print the answer with its retrieval hits
    Ask {
        /// Your question
        question: String,
    },
    /// Check that the backend is reachable
    Health,
}

fn parse_provider(s: &str) -> Result<ModelProvider, String> {
    ModelProvider::from_str(s).ok_or_else(|| format!("unknown provider '{}', expected openai or bailian", s))
}

/// Log to `<data_dir>/ragdesk/ragdesk.log`; the terminal belongs to the UI.
fn init_logging() -> Result<WorkerGuard> {
    let log_dir = config::data_dir()?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("could not create {}", log_dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, "ragdesk.log"));
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RAGDESK_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging()?;

    let config_path = Config::get_config_path()?;
    let config = Config::load_from(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path.display(), "unreadable config, using defaults");
        Config::new()
    });

    match cli.command {
        None => run_tui(config, config_path, cli.base_url, cli.provider).await,
        Some(command) => {
            let mut config = config;
            if let Some(base_url) = cli.base_url {
                config.base_url = base_url;
            }
            if let Some(provider) = cli.provider {
                config.model_provider = provider;
            }
            match command {
                Commands::Ask { question } => ask(&config, &question).await,
                Commands::Health => health(&config).await,
            }
        }
    }
}

async fn ask(config: &Config, question: &str) -> Result<()> {
    let client = RagClient::new(&config.base_url);
    let response = client.query(&config.query_request(question)).await?;

    println!("{}", response.answer);

    let hits = response.retrieval.unwrap_or_default();
    if !hits.is_empty() {
        let reranked = if response.use_rerank { ", reranked" } else { "" };
        println!("\nRetrieval ({} hits{}):", hits.len(), reranked);
        for (i, hit) in hits.iter().enumerate() {
            let rerank = hit
                .rerank_score
                .map(|s| format!("  rerank {:.1}", s))
                .unwrap_or_default();
            println!("#{}  similarity {:.1}%{}", i + 1, hit.score * 100.0, rerank);
            println!("    {}", hit.content.replace('\n', " "));
        }
    } else if !response.contexts.is_empty() {
        println!("\nContexts:");
        for (i, context) in response.contexts.iter().enumerate() {
            println!("#{}  {}", i + 1, context.replace('\n', " "));
        }
    }
    Ok(())
}

async fn health(config: &Config) -> Result<()> {
    let client = RagClient::new(&config.base_url);
    let health = client
        .health()
        .await
        .with_context(|| format!("backend at {} is not reachable", client.base_url()))?;
    println!("{}: {}", client.base_url(), health.status);
    Ok(())
}

async fn run_tui(
    config: Config,
    config_path: PathBuf,
    base_url: Option<String>,
    provider: Option<ModelProvider>,
) -> Result<()> {
    let store = TranscriptStore::default_location()?;
    let history = store.load().unwrap_or_else(|e| {
        warn!(error = %e, path = %store.path().display(), "could not read saved transcript");
        Vec::new()
    });

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let mut app = App::new(config, events.sender())
        .with_config_path(config_path)
        .with_overrides(base_url, provider);
    app.chat.restore(history);
    app.chat.subscribe(Box::new(store));
    info!(base_url = %app.client.base_url(), "ragdesk started");

    let result = run_loop(&mut terminal, &mut events, &mut app).await;

    app.cancel_stream();
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
