//! # Authorization HTTP Server
//!
//! Serves the ICOM authorization core over JSON. See
//! [`icom_authz::server`] for the endpoint list.
//!
//! ## Configuration
//!
//! A TOML file (`--config`, or `AUTHZ_CONFIG`) provides the session, engine,
//! server and policy sections; every section is optional. `--port` and
//! `--metrics-port` override the file. `RUST_LOG` overrides the log level.

use anyhow::{Context, Result};
use clap::Parser;
use icom_authz::server::{create_metrics_router, create_router, spawn_prune_task, AppState};
use icom_authz::{AuthzConfig, AuthzService};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ICOM authorization server CLI
#[derive(Parser)]
#[command(name = "authz-server")]
#[command(about = "Cross-realm communication authorization service")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "AUTHZ_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

fn load_config(cli: &Cli) -> Result<AuthzConfig> {
    let mut config = match &cli.config {
        Some(path) => AuthzConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AuthzConfig::default(),
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.server.metrics_port = port;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ICOM Authorization Server v{}", icom_authz::VERSION);

    let config = load_config(&cli)?;

    info!("Configuration:");
    info!("  Port: {}", config.server.port);
    info!("  Metrics Port: {}", config.server.metrics_port);
    info!("  Session TTL: {}s", config.session.ttl_secs);
    info!(
        "  Policy: {}",
        config
            .policy
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );

    let service = Arc::new(
        AuthzService::from_config(&config).context("Failed to initialize authorization service")?,
    );

    let prune_task = spawn_prune_task(Arc::clone(&service), config.prune_interval());

    let state = AppState::new(service);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    let metrics_addr = SocketAddr::new(host, config.server.metrics_port);

    let app = create_router(state.clone());
    let metrics_app = create_metrics_router(state);

    info!("Starting HTTP server on {}", addr);
    info!("Starting metrics/admin server on {}", metrics_addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server on {}", addr))?;
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", metrics_addr))?;

    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    let metrics_server = axum::serve(metrics_listener, metrics_app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    let result = tokio::try_join!(
        async {
            server.await.map_err(|e| {
                error!("HTTP server error: {}", e);
                e
            })
        },
        async {
            metrics_server.await.map_err(|e| {
                error!("Metrics server error: {}", e);
                e
            })
        }
    );

    prune_task.abort();
    result.context("Server error")?;

    info!("Servers shut down gracefully");
    Ok(())
}
