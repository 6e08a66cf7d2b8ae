use thiserror::Error;
use uuid::Uuid;

/// Таксономия ошибок ядра резервирования. Всё, кроме провала публикации
/// событий, возвращается вызывающей стороне синхронно.
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("session {0} not found or inactive")]
    SessionNotFound(Uuid),

    #[error("seat {0} not found")]
    SeatNotFound(Uuid),

    #[error("reservation {0} not found")]
    ReservationNotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("seat {0} is blocked for maintenance")]
    SeatBlocked(String),

    #[error("{0}")]
    Conflict(String),

    #[error("reservation {0} is expired or no longer pending")]
    NotConfirmable(Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}
