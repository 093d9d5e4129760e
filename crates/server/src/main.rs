use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mucache_core::{
    load_config, load_config_or_default, validate_config, LogFormat, ShutdownReason,
};
use mucache_server::api::create_router;
use mucache_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when `MUCACHE_CONFIG` is not set
const DEFAULT_CONFIG_PATH: &str = "mucache.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // An explicit config path must exist; the default one is optional
    let config = match std::env::var("MUCACHE_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            load_config(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
        Err(_) => load_config_or_default(&PathBuf::from(DEFAULT_CONFIG_PATH))
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH))?,
    };

    init_logging(config.logging.format);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("mucache {} starting", VERSION);
    info!("Cache directory: {:?}", config.cache.resolved_dir());
    info!("UI directory: {:?}", config.server.ui_dir);

    let state = Arc::new(AppState::from_config(config.clone()).await?);
    let liveness = Arc::clone(state.liveness());
    let watchdog = liveness.spawn_watchdog();

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Serving on http://{}", listener.local_addr().unwrap_or(addr));

    // Signals feed the same shutdown path as the client
    tokio::spawn({
        let liveness = Arc::clone(&liveness);
        async move {
            shutdown_signal().await;
            liveness.request_shutdown(ShutdownReason::Signal);
        }
    });

    let graceful = {
        let liveness = Arc::clone(&liveness);
        async move {
            let reason = liveness.wait_for_shutdown().await;
            info!("Shutting down ({}), draining requests", reason);
        }
    };
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .await
    });

    // Wait for shutdown to start, or for the server to fail on its own
    tokio::select! {
        _ = liveness.wait_for_shutdown() => {}
        result = &mut server => {
            result.context("Server task failed")?.context("Server error")?;
        }
    }

    if !server.is_finished() {
        match tokio::time::timeout(liveness.drain_timeout(), &mut server).await {
            Ok(result) => result.context("Server task failed")?.context("Server error")?,
            Err(_) => {
                warn!(
                    "Requests still running after {}s, closing them",
                    liveness.drain_timeout().as_secs()
                );
                server.abort();
            }
        }
    }

    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }
    liveness.mark_stopped();
    info!("Server shut down");

    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
