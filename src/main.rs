//! CORS Relay - forwards browser requests to upstream APIs
//!
//! Serves the relay and its admin endpoints over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cors_relay::api::create_router;
use cors_relay::{spawn_cleanup_task, AppState, Config};

/// Main entry point for the relay server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load server settings from the environment and the relay document
/// 3. Build the relay controller and its response cache
/// 4. Start the background expiry sweep and the reload listener
/// 5. Serve until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cors_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CORS relay");

    let config = Config::from_env();
    let relay_config = config
        .load_relay_config()
        .context("failed to load relay configuration")?;
    info!(
        port = config.server_port,
        routes = relay_config.routes.len(),
        timeout_ms = relay_config.timeout,
        retries = relay_config.retries,
        cache_enabled = relay_config.cache.enabled,
        cache_max_size = relay_config.cache.max_size,
        "configuration loaded"
    );

    let state = AppState::from_config(relay_config).context("invalid relay configuration")?;

    let cleanup_handle = spawn_cleanup_task(
        state.relay.cache().clone(),
        Duration::from_secs(config.cleanup_interval.max(1)),
    );
    let reload_handle = spawn_reload_listener(state.clone(), config.clone());

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cleanup_handle.abort();
    reload_handle.abort();
    info!("Relay shutdown complete");
    Ok(())
}

/// Re-reads `RELAY_CONFIG` on SIGHUP and swaps it in.
#[cfg(unix)]
fn spawn_reload_listener(state: AppState, config: Config) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                error!(error = %e, "failed to install SIGHUP handler, reload disabled");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading relay configuration");
            let result = match config.load_relay_config() {
                Ok(relay_config) => state.reload(relay_config).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(error = %e, "reload rejected, keeping current configuration");
            }
        }
    })
}

#[cfg(not(unix))]
fn spawn_reload_listener(_state: AppState, _config: Config) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {})
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
