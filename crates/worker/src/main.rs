use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use riskcast_worker::config::WorkerConfig;
use riskcast_worker::runner::JobRunner;
use riskcast_worker::source::ConfiguredSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "riskcast_worker=debug,riskcast_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    let source = ConfiguredSource::from_config(&config.source)
        .context("Invalid probability source configuration")?;
    tracing::info!(source = source.name(), "Loaded worker configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = riskcast_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    riskcast_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database connection pool created");

    // --- Runner ---
    let cancel = CancellationToken::new();
    let runner =
        JobRunner::new(pool, source, config.poll_interval).with_stale_after(config.stale_after);
    let runner_cancel = cancel.clone();
    let handle = tokio::spawn(async move { runner.run(runner_cancel).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;
    tracing::info!("Shutdown signal received");

    cancel.cancel();
    handle.await.context("Job runner task panicked")?;
    tracing::info!("Worker stopped");
    Ok(())
}
