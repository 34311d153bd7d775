use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use conference_api::{
    app, config,
    jobs::{JobScheduler, NotificationPassJob, PoolMetricsJob},
    middleware, services,
};
use domain::services::Services;
use shared::SystemClock;
use tracing::info;

/// Upper bound on waiting for background jobs after a shutdown signal.
const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics().context("failed to install Prometheus recorder")?;

    info!("Starting conference registry API v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let mailer = services::mailer_from_config(&config.email)?;
    let services = Services::new(
        persistence::postgres_repositories(pool.clone()),
        mailer,
        Arc::new(SystemClock),
        config.scheduler.settings(),
    );

    let mut jobs = JobScheduler::new();
    jobs.register(PoolMetricsJob::new(pool.clone()));
    if config.scheduler.enabled {
        jobs.register(NotificationPassJob::new(
            services.scheduler.clone(),
            config.scheduler.poll_interval_secs,
        ));
    }
    jobs.start();

    let addr = config.socket_addr()?;
    let app = app::create_app(config, services, Some(pool.clone()));

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobs.shutdown();
    jobs.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
