//! Opsdesk server.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d postgres redis
//!
//! # Run server
//! cargo run --bin opsdesk-server
//! ```

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use opsdesk_reset::stores::{PostgresResetStore, RedisRateLimiter, RedisSessionResolver};
use opsdesk_reset::{ResetEnvironment, SystemClock};
use opsdesk_server::{Config, Mailer, build_app};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opsdesk=info,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Opsdesk server");

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        metrics_port = config.server.metrics_port,
        smtp = config.smtp.is_some(),
        "Configuration loaded"
    );

    // Metrics exporter on its own port
    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port)
        .parse()
        .context("Invalid metrics address")?;
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )
        .context("Invalid histogram buckets")?
        .with_http_listener(metrics_addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    opsdesk_reset::metrics::register();
    info!(address = %metrics_addr, "Metrics exporter listening");

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let store = PostgresResetStore::new(pool);
    store.migrate().await?;
    info!("Database ready");

    info!("Connecting to Redis...");
    let redis_client = redis::Client::open(config.redis.url.as_str())
        .context("Invalid Redis URL")?;
    let redis = redis::aio::ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connected");

    let env = ResetEnvironment::new(
        store,
        RedisRateLimiter::from_manager(redis.clone()),
        Mailer::from_config(config.smtp.as_ref())?,
        RedisSessionResolver::from_manager(redis),
        Arc::new(SystemClock),
        config.reset.to_reset_config(),
    )?;
    let env = Arc::new(env);

    let (sweeper, stop_sweeper) = env.sweeper();
    let sweeper_handle = tokio::spawn(sweeper.run());

    let app = build_app(Arc::clone(&env));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = stop_sweeper.send(true);
    let _ = sweeper_handle.await;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully..."),
    }
}
