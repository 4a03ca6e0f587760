//! Inspector service binary.
//!
//! Serves the event API, runs the domain liveness monitor and polls Telegram
//! for operator commands until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use liveness::{DomainCommands, HttpProbe, JsonFileStore, LivenessMonitor};
use notify::{CommandRegistry, Notifier, TelegramChannel, UpdatePoller};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use inspector::{server, Config};

const DEFAULT_LOG_FILTER: &str = "inspector=info,notify=info,liveness=info";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting inspector...");

    let channels = config.channels();
    let telegram = Arc::new(TelegramChannel::with_api_url(
        config.telegram_token.clone(),
        config.telegram_api_url.clone(),
    ));

    // Deployment threads and registration notices
    let notifier = Arc::new(Notifier::with_ttl(
        telegram.clone(),
        channels.clone(),
        config.thread_ttl(),
    ));

    // Domain liveness
    let store = Arc::new(JsonFileStore::new(&config.domains_file));
    let probe = HttpProbe::new(config.probe_timeout()).context("Failed to build probe client")?;
    let probe = Arc::new(probe);
    let monitor = Arc::new(LivenessMonitor::new(
        store.clone(),
        probe,
        telegram.clone(),
        channels.domains.clone(),
        config.monitor_config(),
    ))
    .spawn();
    info!(file = %config.domains_file.display(), "Domain monitor running");

    // Operator commands
    if !channels.domains.is_numeric() {
        warn!(
            chat = %channels.domains,
            "Domain chat is not a numeric id; operator commands from it will be ignored"
        );
    }
    let commands = Arc::new(DomainCommands::new(store));
    let mut registry = CommandRegistry::new().allow_chats([channels.domains.clone()]);
    commands.register(&mut registry);
    let poller_cancel = CancellationToken::new();
    let poller = tokio::spawn(
        UpdatePoller::new(telegram, Arc::new(registry)).run(poller_cancel.clone()),
    );

    // HTTP API
    let app = server::build_router(server::AppState {
        notifier: notifier.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = config.port, "Inspector listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    info!("Shutting down background tasks");
    monitor.shutdown().await;
    poller_cancel.cancel();
    if let Err(e) = poller.await {
        warn!(error = %e, "Update poller task failed");
    }
    notifier.shutdown().await;

    info!("Inspector stopped");
    served
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
