use aicc_digest::config::Config;
use aicc_digest::feeds::daily_summary::DailySummaryFetcher;
use aicc_digest::logging;
use aicc_digest::settings::{JsonFileStore, SettingsHandle};
use aicc_digest::sync::{Renderer, SummarySync, SyncOutcome};
use aicc_digest::ui::{self, console, TuiRenderer};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "aicc-digest")]
#[command(about = "Daily digest of new AI Character Cards, in your terminal")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the summary drawer (default)
    Tui,
    /// Fetch the summary once and exit
    Sync {
        /// Show the new-cards popup even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// Print the cached summary without fetching
    Show,
    /// Turn the new-cards popup on or off
    Popup { state: Toggle },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _log_guard = logging::init(&config)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting aicc-digest");

    let store = JsonFileStore::open(config.settings_path())?;
    tracing::info!(path = %store.path().display(), "settings store opened");
    let settings = SettingsHandle::open(Box::new(store), config.storage.module_key.clone())?;
    let fetcher = Arc::new(DailySummaryFetcher::from_config(&config.feed));

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let renderer = Arc::new(TuiRenderer::new(tx.clone()));
            let service = Arc::new(SummarySync::new(fetcher, renderer, settings));
            ui::run(config, service, tx, rx).await?;
        }
        Command::Sync { force } => {
            let service = headless(fetcher, settings);
            println!("Syncing daily summary...");
            match service.sync(force).await {
                SyncOutcome::Updated { notified } => {
                    if !notified {
                        println!("{}", console::snapshot_text(service.display_snapshot().as_ref()));
                    }
                    println!("Sync complete");
                }
                SyncOutcome::Failed(err) => {
                    println!("Sync failed ({}); cached data left unchanged", err);
                }
            }
        }
        Command::Show => {
            let service = headless(fetcher, settings);
            let snapshot = service.display_snapshot();
            println!("{}", console::status_text(&service.settings(), snapshot.as_ref()));
        }
        Command::Popup { state } => {
            let service = headless(fetcher, settings);
            let enabled = matches!(state, Toggle::On);
            service.set_show_popup(enabled)?;
            println!(
                "New cards popup {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    tracing::info!("exiting");
    Ok(())
}

fn headless(fetcher: Arc<DailySummaryFetcher>, settings: SettingsHandle) -> SummarySync {
    let renderer: Arc<dyn Renderer> = Arc::new(console::ConsoleRenderer);
    SummarySync::new(fetcher, renderer, settings)
}
