use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub reservation: ReservationConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки Kafka
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub client_id: String,
}

// Настройки жизненного цикла брони: таймаут, лок, sweeper
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    pub timeout_seconds: i64,
    pub lock_ttl_seconds: u64,
    pub lock_max_retries: u32,
    pub sweep_interval_seconds: u64,
    pub sweep_batch_size: i64,
    pub retention_days: i64,
    pub retention_interval_seconds: u64,
    pub stats_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_tickets=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            kafka: KafkaConfig {
                brokers: env::var("KAFKA_BROKERS").expect("KAFKA_BROKERS must be set"),
                client_id: env::var("KAFKA_CLIENT_ID")
                    .unwrap_or_else(|_| "ticket-cinema-app".to_string()),
            },
            reservation: ReservationConfig {
                timeout_seconds: env::var("RESERVATION_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("RESERVATION_TIMEOUT_SECONDS must be a valid number"),
                lock_ttl_seconds: env::var("SEAT_LOCK_TTL_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("SEAT_LOCK_TTL_SECONDS must be a valid number"),
                lock_max_retries: env::var("SEAT_LOCK_MAX_RETRIES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .expect("SEAT_LOCK_MAX_RETRIES must be a valid number"),
                sweep_interval_seconds: env::var("SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("SWEEP_INTERVAL_SECONDS must be a valid number"),
                sweep_batch_size: env::var("SWEEP_BATCH_SIZE")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .expect("SWEEP_BATCH_SIZE must be a valid number"),
                retention_days: env::var("RESERVATION_RETENTION_DAYS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("RESERVATION_RETENTION_DAYS must be a valid number"),
                retention_interval_seconds: env::var("RETENTION_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .expect("RETENTION_INTERVAL_SECONDS must be a valid number"),
                stats_interval_seconds: env::var("STATS_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("STATS_INTERVAL_SECONDS must be a valid number"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_values_fall_back_to_defaults() {
        env::set_var("DATABASE_URL", "postgres://localhost/cinema_test");
        env::set_var("REDIS_URL", "redis://localhost:6379");
        env::set_var("KAFKA_BROKERS", "localhost:9094");

        let config = Config::from_env();

        assert_eq!(config.reservation.timeout_seconds, 30);
        assert_eq!(config.reservation.lock_ttl_seconds, 10);
        assert_eq!(config.reservation.lock_max_retries, 3);
        assert_eq!(config.reservation.sweep_interval_seconds, 10);
        assert_eq!(config.reservation.sweep_batch_size, 50);
        assert_eq!(config.reservation.retention_days, 30);
        assert_eq!(config.database.pool_size, 20);
        assert_eq!(config.kafka.client_id, "ticket-cinema-app");
    }
}
