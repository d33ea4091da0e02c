// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! mediaflow server - streams media acquisition, analysis and research jobs
//! over server-sent events.
//!
//! # Examples
//!
//! ```bash
//! # Listen on the default address (127.0.0.1:8787)
//! mediaflow
//!
//! # Custom config file and address
//! mediaflow --config ./mediaflow.json --bind 0.0.0.0:9000
//!
//! # Debug logging
//! mediaflow --verbose
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mediaflow_fetch::SystemKeychain;
use mediaflow_server::{Orchestrator, ServerConfig, build_router};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// ============================================================================
// CLI Definition
// ============================================================================

/// mediaflow server.
#[derive(Parser)]
#[command(name = "mediaflow")]
#[command(about = "Streaming orchestrator for remote media and AI jobs")]
#[command(long_about = r"
mediaflow acquires media from video platforms, analyzes uploads and runs
research jobs, streaming progress to the client as server-sent events.

API keys are read from GEMINI_API_KEY and RESEARCH_API_KEY (a .env file is
honoured), falling back to the system keychain.
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to <config dir>/mediaflow/config.json).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file and MEDIAFLOW_BIND.
    #[arg(long, short)]
    bind: Option<String>,

    /// Verbose output (show debug info).
    #[arg(long, short)]
    verbose: bool,

    /// Quiet mode (warnings and errors only).
    #[arg(long, short)]
    quiet: bool,
}

// ============================================================================
// Logging
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("mediaflow=debug,tower_http=debug,info")
    } else if quiet {
        EnvFilter::new("mediaflow=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mediaflow=info,tower_http=info,warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: ignoring .env file: {e}");
        }
    }
    setup_logging(cli.verbose, cli.quiet);

    let mut config = ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_env();
    config.fill_from_keychain(&SystemKeychain::new()).await;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let bind = config.bind.clone();
    let orchestrator = Orchestrator::from_config(config).context("Failed to initialise service clients")?;
    let app = build_router(orchestrator);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(addr = %bind, "mediaflow listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
