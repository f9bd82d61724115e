use arena_wallet::application::context::{AppContext, Stores};
use arena_wallet::config::AppConfig;
use arena_wallet::domain::clock::SystemClock;
use arena_wallet::interfaces::http;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the wallet HTTP API.
    Serve {
        /// JSON configuration file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Issue the fixed mock code and log it instead of sending it.
        #[arg(long)]
        mock_otp: bool,
    },
    /// Validate a configuration file and exit.
    CheckConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve {
            config,
            bind,
            db_path,
            mock_otp,
        } => serve(config, bind, db_path, mock_otp).await,
        Command::CheckConfig { path } => {
            let config = AppConfig::load(&path).into_diagnostic()?;
            println!(
                "configuration ok: {} provider(s), mock_mode={}",
                config.providers.len(),
                config.otp.mock_mode
            );
            Ok(())
        }
    }
}

async fn serve(
    config: Option<PathBuf>,
    bind: String,
    db_path: Option<PathBuf>,
    mock_otp: bool,
) -> Result<()> {
    let mut config = match config {
        Some(path) => AppConfig::load(path).into_diagnostic()?,
        None => AppConfig::default(),
    };
    if mock_otp {
        config.otp.mock_mode = true;
    }

    if config.admin.token.is_empty() {
        tracing::warn!("admin.token is not configured, back-office routes will refuse every request");
    }

    let stores = open_stores(db_path)?;
    let sweep_interval = config.sweep_interval();
    let context = Arc::new(AppContext::new(config, stores, Arc::new(SystemClock)).into_diagnostic()?);

    let sweeper = context.verifier.clone().spawn_sweeper(sweep_interval);

    let listener = tokio::net::TcpListener::bind(&bind).await.into_diagnostic()?;
    tracing::info!(address = %bind, "listening");

    axum::serve(listener, http::router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}

fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Stores::rocksdb(path).into_diagnostic(),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Stores::in_memory())
        }
        None => Ok(Stores::in_memory()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
