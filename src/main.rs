use std::time::Duration;
use tokio::task;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_tickets::{config::Config, services::ExpirationSweeper, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cinema seat-reservation core");

    let reservation = config.reservation.clone();
    let state = AppState::new(config)
        .await
        .expect("Failed to initialise application state");
    info!("Database, Redis and Kafka connected");

    let sweeper = ExpirationSweeper::new(state);

    // --- Background passes ---

    // Expiry pass: освобождение мест просроченных броней
    let expiry = sweeper.clone();
    let expiry_interval = Duration::from_secs(reservation.sweep_interval_seconds);
    task::spawn(async move {
        loop {
            expiry.expire_overdue().await;
            tokio::time::sleep(expiry_interval).await;
        }
    });

    // Retention pass: удаление старых терминальных броней
    let retention = sweeper.clone();
    let retention_interval = Duration::from_secs(reservation.retention_interval_seconds);
    task::spawn(async move {
        loop {
            tokio::time::sleep(retention_interval).await;
            retention.purge_old_terminal().await;
        }
    });

    // Observability pass: счётчики статусов для мониторинга
    let stats = sweeper;
    let stats_interval = Duration::from_secs(reservation.stats_interval_seconds);
    task::spawn(async move {
        loop {
            tokio::time::sleep(stats_interval).await;
            stats.log_status_counts().await;
        }
    });

    info!(
        "Expiration sweeper running (tick every {}s)",
        reservation.sweep_interval_seconds
    );

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    info!("Shutting down");
}
