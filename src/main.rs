//! bucketd - a TTL-bounded object cache served over DNS and HTTP
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load configuration from file and environment, apply CLI overrides
//! 3. Connect to Redis, or create the in-process store and its TTL cleanup task
//! 4. Start the HTTP and/or DNS listeners
//! 5. Handle graceful shutdown on SIGINT/SIGTERM

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bucketd::api::create_router;
use bucketd::config::{Config, Engine, Mode};
use bucketd::dns::{start_dns_server, QueryHandler};
use bucketd::store::{CachePort, MemoryStore, RedisStore};
use bucketd::{spawn_cleanup_task, AppState};

#[derive(Debug, Parser)]
#[command(name = "bucketd", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "bucketd.toml")]
    config: PathBuf,

    /// Listeners to start: http, dns or both (overrides core.mode)
    #[arg(short, long)]
    mode: Option<Mode>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bucketd=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("Starting bucketd");

    let mut config = Config::load(&cli.config).context("failed to load configuration")?;
    if let Some(mode) = cli.mode {
        config.core.mode = mode;
    }
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: mode={:?}, max_key_length={}, max_value_length={}, max_ttl={}s, max_elements={}",
        config.core.mode,
        config.core.max_key_length,
        config.core.max_value_length,
        config.core.max_ttl,
        config.core.max_elements
    );

    let (store, cleanup_handle) = match config.store.engine {
        Engine::Redis => {
            let redis = RedisStore::connect(&config.redis)
                .await
                .with_context(|| format!("failed to connect to Redis at {}", config.redis.address))?;
            let store: Arc<dyn CachePort> = Arc::new(redis);
            (store, None)
        }
        Engine::Memory => {
            let memory = Arc::new(MemoryStore::new());
            let handle = spawn_cleanup_task(memory.clone(), config.store.cleanup_interval);
            let store: Arc<dyn CachePort> = memory;
            (store, Some(handle))
        }
    };
    info!(engine = ?config.store.engine, "Store initialized");

    let mut listeners = JoinSet::new();

    if config.core.mode.serves_http() {
        let app = create_router(AppState::from_config(&config, store.clone()));
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
        info!("HTTP server listening on http://{}", addr);
        info!("Accepting HTTP requests for host {}", config.http.hostname);

        listeners.spawn(async move {
            axum::serve(listener, app)
                .await
                .context("HTTP server failed")
        });
    }

    if config.core.mode.serves_dns() {
        let handler = Arc::new(QueryHandler::new(
            store.clone(),
            config.domain_policy(),
            config.static_answer(),
        ));
        let addr = SocketAddr::from(([0, 0, 0, 0], config.dns.port));

        listeners.spawn(async move {
            start_dns_server(addr, handler)
                .await
                .with_context(|| format!("DNS server on {addr} failed"))
        });
    }

    tokio::select! {
        _ = shutdown_signal() => {}
        Some(joined) = listeners.join_next() => {
            match joined {
                Ok(Ok(())) => warn!("Listener exited"),
                Ok(Err(err)) => error!(error = ?err, "Listener failed"),
                Err(err) => error!(error = %err, "Listener task panicked"),
            }
        }
    }

    listeners.abort_all();
    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
    info!("Server shutdown complete");

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
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
