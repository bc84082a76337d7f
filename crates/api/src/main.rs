//! facelink coordinator entrypoint.
//!
//! Assembles the store pool, the two schedulers with their queue reapers,
//! and the HTTP front-end from the YAML configuration, then serves until a
//! termination signal and drains for up to five seconds.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facelink_api::cli::Cli;
use facelink_api::router::build_router;
use facelink_api::state::AppState;
use facelink_core::config::{Config, LoggerConfig};
use facelink_core::transport::HttpTransport;
use facelink_panels::PanelScheduler;
use facelink_recognizers::RecognizerScheduler;

/// How long open connections get to finish after the termination signal.
const DRAIN_WINDOW: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("facelink: {e}");
            std::process::exit(1);
        }
    };
    if let Some(addr) = cli.addr {
        config.http_server.addr = addr;
    }
    if let Some(port) = cli.port {
        config.http_server.port = port;
    }

    init_tracing(&config.logger);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facelink coordinator starting");

    // --- Store ---
    let pool = match facelink_db::connect(&config.storage).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "unable to reach the store");
            std::process::exit(1);
        }
    };
    tracing::info!(
        addr = %config.storage.addr,
        port = config.storage.port,
        db = %config.storage.default_db,
        "store connection established"
    );

    // --- Schedulers ---
    let transport = match HttpTransport::new(config.http_client.timeout_ms) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            tracing::error!(error = %e, "unable to build HTTP client");
            std::process::exit(1);
        }
    };
    let recognizers = match RecognizerScheduler::new(&config.face_recognizers, Arc::clone(&transport))
    {
        Ok(scheduler) => Arc::new(scheduler),
        Err(e) => {
            tracing::error!(error = %e, "invalid face recognizer address");
            std::process::exit(1);
        }
    };
    let panels = match PanelScheduler::new(&config.control_panels, transport) {
        Ok(scheduler) => Arc::new(scheduler),
        Err(e) => {
            tracing::error!(error = %e, "invalid control panel address");
            std::process::exit(1);
        }
    };
    tracing::info!(
        workers = recognizers.worker_count(),
        panels = panels.panel_count(),
        "schedulers initialized"
    );

    // --- Queue reapers ---
    let reaper_cancel = CancellationToken::new();
    let reapers = [
        recognizers.awaiting.spawn_reaper(reaper_cancel.clone()),
        panels.enrollments.spawn_reaper(reaper_cancel.clone()),
        panels.awaiting_controls.spawn_reaper(reaper_cancel.clone()),
    ];

    // --- HTTP server ---
    let src_addr = config.source_addr();
    if src_addr.starts_with("https") {
        tracing::info!("TLS key/crt configured; advertising https (termination handled by the fronting listener)");
    }
    let bind = format!("{}:{}", config.http_server.addr, config.http_server.port);
    let state = AppState {
        pool,
        config: Arc::new(config),
        src_addr: src_addr.clone(),
        recognizers,
        panels,
    };
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %bind, error = %e, "unable to bind listen address");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind, src_addr = %src_addr, "listening");

    let drain = CancellationToken::new();
    let server_drain = drain.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_drain.cancelled().await })
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutdown signal received, draining connections");

    drain.cancel();
    match tokio::time::timeout(DRAIN_WINDOW, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("connections drained"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "server task failed"),
        Err(_) => tracing::warn!("drain window elapsed, abandoning open connections"),
    }

    reaper_cancel.cancel();
    for reaper in reapers {
        let _ = reaper.await;
    }

    tracing::info!("facelink coordinator stopped");
}

fn init_tracing(cfg: &LoggerConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(cfg.ansi))
        .init();
}

/// Wait for a termination signal.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the coordinator
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT");
        }
        () = terminate => {
            tracing::info!("received SIGTERM");
        }
    }
}
