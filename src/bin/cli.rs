//! Command-line entry point: inspect today's checklist or run the sync
//! engine against a backend.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use weekquest::{
    EngineConfig, HttpRemoteStore, JsonFileStore, LocalStore, MemoryRemoteStore, RemoteStore,
    Result, SyncEngine, calendar,
};

/// WeekQuest: weekly task tracker with local-first sync.
#[derive(Parser)]
#[command(name = "weekquest", version, about)]
struct Cli {
    /// Path to the state file. Defaults to the platform config directory.
    #[arg(long)]
    state_file: Option<std::path::PathBuf>,

    /// Base URL of the sync backend. Without it the engine runs offline
    /// against local state only.
    #[arg(long)]
    base_url: Option<String>,

    /// Household identifier on the backend.
    #[arg(long, default_value = "default")]
    household: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print today's checklist, stars, and streak.
    Show,
    /// Run the sync engine until interrupted.
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Default to our own info logs; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weekquest=info")),
        )
        .init();

    let cli = Cli::parse();

    let local: Arc<dyn LocalStore> = Arc::new(match cli.state_file {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::at_default_location()?,
    });
    let remote: Arc<dyn RemoteStore> = match &cli.base_url {
        Some(base) => Arc::new(HttpRemoteStore::new(base.clone(), cli.household.clone())),
        None => Arc::new(MemoryRemoteStore::new()),
    };

    let config = EngineConfig {
        household_id: cli.household.clone(),
        ..EngineConfig::default()
    };
    let engine = SyncEngine::start(local, remote, config).await?;

    match cli.command.unwrap_or(Command::Show) {
        Command::Show => show(&engine).await,
        Command::Run => run(&engine).await,
    }
}

async fn show(engine: &SyncEngine) -> Result<()> {
    let today = calendar::today();
    let day = calendar::weekday_of(today);
    let snapshot = engine.snapshot().await;
    let progress = engine.today_progress().await;

    println!("{} {today}", day.label());
    for task in engine.tasks_for_day(day).await {
        let mark = if progress.is_completed(&task.id) {
            "x"
        } else if progress.is_skipped(&task.id) {
            "-"
        } else {
            " "
        };
        println!("  [{mark}] {} {}", task.emoji, task.title);
    }
    for task in engine.bonus_tasks().await {
        let mark = if progress.is_completed(&task.id) { "x" } else { " " };
        println!("  [{mark}] {} {} (bonus)", task.emoji, task.title);
    }
    println!(
        "stars: {}  streak: {} weeks  status: {}",
        snapshot.bonus_stars,
        engine.current_streak().await,
        engine.status().borrow().as_str()
    );
    Ok(())
}

async fn run(engine: &SyncEngine) -> Result<()> {
    let mut status = engine.status();
    info!(status = %*status.borrow(), "sync engine running, Ctrl-C to stop");
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(status = %*status.borrow(), "sync status changed");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
