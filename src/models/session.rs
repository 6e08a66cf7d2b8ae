use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Сеанс читается ядром ради is_active и ticket_price; CRUD сеансов
/// живёт вне этого ядра.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub movie_title: String,
    pub room: String,
    pub starts_at: DateTime<Utc>,
    pub ticket_price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
