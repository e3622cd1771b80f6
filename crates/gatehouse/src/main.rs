//! # Gatehouse - Palisade Stateless Login Engine
//!
//! Issues unforgeable challenge blobs (CAPTCHA + CSRF token + proof-of-work
//! parameters, sealed by a rotating-key codec) and validates the client's
//! response through a fail-fast pipeline - with no server-side session
//! storage at all.
//!
//! ## Architecture
//! ```text
//! Browser → Gatehouse ─┬→ /challenge  (prepare: forge CAPTCHA, seal state)
//!                      └→ /login, /signup  (validate: 22-step chain)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod captcha;
mod codec;
mod config;
mod hashcash;
mod password;
mod routes;
mod staller;
mod state;
mod token;

use codec::rotation_worker;
use config::AppConfig;
use state::AppState;

/// Palisade Gatehouse - Stateless Login Engine
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatehouse.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    pub listen: Option<String>,

    /// CAPTCHA image root (overrides config)
    #[arg(long, env = "CAPTCHA_IMAGES")]
    pub captcha_images: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!(
        "🏰 Starting Palisade Gatehouse v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Initialize application state (validates codec parameters, CAPTCHA
    // inventory, and repository salt before serving)
    let state = AppState::new(config.clone())?;
    info!(
        "🔑 State codec ready (ring capacity: {})",
        state.codec.max_keys()
    );

    // Spawn key rotation background worker
    let codec = Arc::clone(&state.codec);
    let rotation_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        rotation_worker(codec, rotation_shutdown).await;
    });

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("🚀 Gatehouse listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("👋 Gatehouse shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
