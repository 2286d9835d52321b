use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventpulse_api::auth::password::hash_password;
use eventpulse_api::config::{BrokerKind, ServerConfig};
use eventpulse_api::router::build_app_router;
use eventpulse_api::state::AppState;
use eventpulse_api::ws::Hub;
use eventpulse_db::repositories::UserRepo;
use eventpulse_events::{Broker, InMemoryBroker, RedisBroker};

/// Budget for the hub loop to close every socket after the server stops.
const HUB_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eventpulse_api=debug,eventpulse_events=info,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    tracing::info!(
        host = %config.host,
        port = %config.port,
        environment = %config.environment,
        "Loaded server configuration"
    );

    // --- Database ---
    let pool = eventpulse_db::create_pool(&config.database_url, &config.pool)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    eventpulse_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    eventpulse_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    if let Some(admin) = &config.admin {
        let hash = hash_password(&admin.password)
            .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;
        if UserRepo::ensure_admin(&pool, &admin.handle, &admin.name, &hash).await? {
            tracing::info!(handle = %admin.handle, "Bootstrap admin created");
        }
    }

    // --- Broker ---
    let broker: Arc<dyn Broker> = match config.broker {
        BrokerKind::Redis => Arc::new(
            RedisBroker::connect(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        BrokerKind::Memory => {
            tracing::warn!("Using in-memory broker; events will not cross replicas");
            Arc::new(InMemoryBroker::default())
        }
    };

    // --- Fan-out hub ---
    let cancel = CancellationToken::new();
    let (hub, hub_loop) = Hub::new(broker, config.hub.clone());
    let hub_handle = tokio::spawn(hub_loop.run(cancel.clone()));

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        hub,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let server_cancel = cancel.clone();
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .into_future(),
    );

    // Drain in-flight requests, bounded once shutdown begins.
    tokio::select! {
        result = &mut server => {
            result.context("Server task panicked")?.context("Server error")?;
        }
        () = cancel.cancelled() => {
            let budget = Duration::from_secs(config.shutdown_timeout_secs);
            match tokio::time::timeout(budget, &mut server).await {
                Ok(result) => result.context("Server task panicked")?.context("Server error")?,
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = config.shutdown_timeout_secs,
                        "Shutdown budget exceeded, dropping in-flight requests"
                    );
                    server.abort();
                }
            }
        }
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();
    if tokio::time::timeout(HUB_DRAIN_TIMEOUT, hub_handle).await.is_err() {
        tracing::warn!("Hub loop did not stop in time");
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
