//! brytonsync - pushes ride files dropped into a Nextcloud folder to
//! Ride with GPS.
//!
//! Intended to be run from a scheduler; each invocation of `run` is a single
//! pass over the source folder.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use brytonsync_core::auth::TokenSource;
use brytonsync_core::{Config, SyncJob};

// ============================================================================
// Constants
// ============================================================================

/// Log filter used when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "info";

/// File name prefix for the daily log files written under `--log-dir`
const LOG_FILE_PREFIX: &str = "brytonsync.log";

#[derive(Parser)]
#[command(name = "brytonsync", version, about)]
struct Cli {
    /// Read settings from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true, env = "BRYTONSYNC_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync pass (default)
    Run,
    /// Validate the cached token, fetching a new one if needed
    CheckAuth,
    /// List a page of your Ride with GPS routes
    Routes {
        /// Page number
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Send a test notification to the configured topic
    Notify {
        /// Message text
        message: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stdout))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.env_file {
        Some(ref path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
        }
        // Load .env file if present (silently ignore if not found)
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_tracing(cli.log_dir.as_deref());

    let config = Config::from_env().context("Invalid configuration")?;
    let job = SyncJob::new(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("brytonsync starting");
            job.run().await;
        }
        Command::CheckAuth => check_auth(&job).await?,
        Command::Routes { page } => print_routes(&job, page).await?,
        Command::Notify { message } => {
            if !job.notifier().send(&message).await {
                warn!(topic = job.notifier().topic(), "Notification was not accepted");
            }
        }
    }

    Ok(())
}

async fn check_auth(job: &SyncJob<'_>) -> Result<()> {
    let (token, source) = job.ensure_token().await?;

    let how = match source {
        TokenSource::Cached => "cached token is valid",
        TokenSource::Refreshed => "cached token was rejected, fetched a new one",
        TokenSource::Fetched => "no cached token, fetched a new one",
    };
    println!("Authentication successful: {}", how);

    if let Some(user) = token.user {
        println!(
            "User: {} ({})",
            user.name.as_deref().unwrap_or("unknown"),
            user.email.as_deref().unwrap_or("no email")
        );
    }
    Ok(())
}

async fn print_routes(job: &SyncJob<'_>, page: u32) -> Result<()> {
    let routes = job.list_routes(page).await?;

    if routes.routes.is_empty() {
        println!("No routes found");
        return Ok(());
    }

    println!("\nYour Routes:");
    println!("{}", "-".repeat(80));
    println!("{:<8} {:<30} {:<12} {:<20}", "ID", "Name", "Distance (km)", "Created");
    println!("{}", "-".repeat(80));

    for route in &routes.routes {
        let name: String = route.name.chars().take(30).collect();
        let distance = route
            .distance_km()
            .map(|km| format!("{:.2}", km))
            .unwrap_or_default();
        let created = route
            .created_at
            .as_deref()
            .map(|c| c.chars().take(16).collect::<String>().replace('T', " "))
            .unwrap_or_default();
        println!("{:<8} {:<30} {:<12} {:<20}", route.id, name, distance, created);
    }

    if let Some(pages) = routes.meta.pagination.page_count {
        println!("\nPage {} of {}", page, pages);
    }
    Ok(())
}
