mod api;
mod config;
mod state;
mod status_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use config::RuntimeSettings;
use state::AppState;

#[derive(Parser)]
#[command(name = "focusmate")]
#[command(about = "FocusMate: a focus-timer companion that chats in character")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        bind: Option<String>,
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check whether a server is running
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = focusmate_config::config_dir();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| focusmate_config::config_file_path(&config_dir));
    let config_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or(config_dir);

    let engine = focusmate_config::load_and_prepare(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let settings = RuntimeSettings::from_env(&engine);

    match cli.command {
        Commands::Serve { bind, port } => {
            let settings = settings.with_overrides(bind, port);
            focusmate_logging::init_logger(engine.log_dir(&config_dir), &settings.log_level)?;
            run_server(engine, config_dir, settings).await?;
        }
        Commands::Status { port } => {
            let settings = settings.with_overrides(None, port);
            status_cmd::run(&settings.addr()).await?;
        }
    }

    Ok(())
}

async fn run_server(
    engine: focusmate_config::EngineConfig,
    config_dir: PathBuf,
    settings: RuntimeSettings,
) -> Result<()> {
    info!(
        bind = %settings.bind_address,
        port = settings.port,
        config_dir = %config_dir.display(),
        "Starting FocusMate"
    );

    let state = Arc::new(AppState::build(&engine, &config_dir)?);

    let app = api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = settings.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("FocusMate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
