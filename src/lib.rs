pub mod config;
pub mod database;
pub mod error;
pub mod messaging;
pub mod models;
pub mod redis_client;
pub mod services;

use std::sync::Arc;

// Shared state для всего ядра резервирования
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub messaging: messaging::MessagingService,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let messaging = messaging::MessagingService::new(&config.kafka)?;

        Ok(Arc::new(Self {
            db,
            redis,
            messaging,
            config,
        }))
    }
}
