use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use procura_events::{EmailConfig, EmailDelivery, NotificationBus, OutboxPersistence};
use procura_matching::PgRegistry;
use procura_worker::config::WorkerConfig;
use procura_worker::jobs::{ForwardingJob, MatchingJob};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procura_worker=debug,procura_matching=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        matching_interval_secs = config.matching_interval.as_secs(),
        forwarding_interval_secs = config.forwarding_interval.as_secs(),
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = procura_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    procura_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    procura_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Notification bus ---
    let bus = Arc::new(NotificationBus::default());
    let persistence_handle = tokio::spawn(OutboxPersistence::run(pool.clone(), bus.subscribe()));

    let registry = PgRegistry::new(pool);
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    // --- Matching ---
    let matching = MatchingJob::new(
        registry.clone(),
        Arc::clone(&bus),
        config.matching_interval,
        config.outreach_enabled,
    );
    let token = cancel.clone();
    handles.push(tokio::spawn(async move { matching.run(token).await }));

    // --- Forwarding ---
    if config.forwarding_enabled {
        let mailer = if config.forwarding_dry_run {
            Some(None)
        } else {
            EmailConfig::from_env().map(|email| Some(EmailDelivery::new(email)))
        };
        match mailer {
            Some(mailer) => {
                let forwarding = ForwardingJob::new(registry, mailer, config.forwarding_interval);
                let token = cancel.clone();
                handles.push(tokio::spawn(async move { forwarding.run(token).await }));
            }
            None => tracing::warn!("SMTP_HOST not set, forwarding to campaign managers disabled"),
        }
    }

    shutdown_signal().await?;

    cancel.cancel();
    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }
    tracing::info!("Jobs stopped");

    // Dropping the last sender closes the channel and ends persistence.
    drop(bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), persistence_handle).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Received SIGINT, starting graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, starting graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        tracing::info!("Received Ctrl-C, starting graceful shutdown");
    }

    Ok(())
}
