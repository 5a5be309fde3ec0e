mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::EnvFilter;
use trendwatch_db::PgTrendStore;
use trendwatch_pipeline::Scanner;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

/// How long shutdown waits for an in-flight scan to wind down.
const SCAN_DRAIN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(trendwatch_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = trendwatch_db::PoolConfig::from_app_config(&config);
    let pool = trendwatch_db::connect_pool(&config.database_url, pool_config).await?;
    trendwatch_db::run_migrations(&pool).await?;

    let store = Arc::new(PgTrendStore::new(pool.clone()));
    let scanner = Arc::new(Scanner::from_config(&config, store)?);
    let shutdown = CancellationToken::new();
    let tasks = TaskTracker::new();

    let mut jobs = scheduler::build_scheduler(
        Arc::clone(&scanner),
        pool.clone(),
        Arc::clone(&config),
        shutdown.clone(),
        tasks.clone(),
    )
    .await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        trendwatch_core::Environment::Development
    ))?;
    let state = AppState {
        pool,
        config: Arc::clone(&config),
        scanner,
        shutdown: shutdown.clone(),
        tasks: tasks.clone(),
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "trendwatch server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Err(e) = jobs.shutdown().await {
        tracing::warn!(error = %e, "scheduler shutdown failed");
    }
    scheduler::drain_scans(&tasks, SCAN_DRAIN_GRACE).await;
    tracing::info!("trendwatch server stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM and cancels any in-flight scan.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    shutdown.cancel();
}
