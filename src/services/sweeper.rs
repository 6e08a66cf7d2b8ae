use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::ReservationStatus;
use crate::services::ReservationService;
use crate::AppState;

/// Периодическая зачистка просроченных PENDING-броней. Без внутреннего
/// состояния: каждый тик заново выбирает пачку и обрабатывает её по одной
/// брони на транзакцию, чтобы один сбой не валил остальные.
#[derive(Clone)]
pub struct ExpirationSweeper {
    state: Arc<AppState>,
    reservations: ReservationService,
}

impl ExpirationSweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        let reservations = ReservationService::new(state.clone());
        Self {
            state,
            reservations,
        }
    }

    /// Expiry pass: до sweep_batch_size просроченных броней за тик.
    /// Хвост сверх лимита дожидается следующего тика.
    pub async fn expire_overdue(&self) {
        let batch: Vec<Uuid> = match sqlx::query_scalar(
            "SELECT id FROM reservations
             WHERE status = 'pending' AND expires_at < NOW()
             ORDER BY expires_at
             LIMIT $1",
        )
        .bind(self.state.config.reservation.sweep_batch_size)
        .fetch_all(&self.state.db.pool)
        .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!("expiry scan failed: {:?}", e);
                return;
            }
        };

        if batch.is_empty() {
            return;
        }

        info!("🧹 found {} expired reservations", batch.len());

        let mut processed = 0usize;
        for reservation_id in batch {
            match self.reservations.expire_reservation(reservation_id).await {
                Ok(()) => processed += 1,
                Err(e) => error!("failed to expire reservation {}: {}", reservation_id, e),
            }
        }

        info!("🧹 {} reservations processed", processed);
    }

    /// Retention pass: терминальные брони старше retention_days удаляются.
    /// Чистое хозяйство, best-effort.
    pub async fn purge_old_terminal(&self) {
        let cutoff = Utc::now() - Duration::days(self.state.config.reservation.retention_days);

        let result = sqlx::query(
            "DELETE FROM reservations
             WHERE status IN ('expired', 'cancelled') AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.state.db.pool)
        .await;

        match result {
            Ok(r) if r.rows_affected() > 0 => {
                info!("🗑 cleanup: {} old reservations removed", r.rows_affected());
            }
            Ok(_) => {}
            Err(e) => error!("reservation cleanup failed: {:?}", e),
        }
    }

    /// Observability pass: счётчики по статусам, только чтение.
    pub async fn log_status_counts(&self) {
        let counts: Vec<(ReservationStatus, i64)> =
            match sqlx::query_as("SELECT status, COUNT(*) FROM reservations GROUP BY status")
                .fetch_all(&self.state.db.pool)
                .await
            {
                Ok(counts) => counts,
                Err(e) => {
                    error!("failed to collect reservation stats: {:?}", e);
                    return;
                }
            };

        let count_for = |status: ReservationStatus| -> i64 {
            counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        debug!(
            "reservations - pending: {}, expired: {}, confirmed: {}",
            count_for(ReservationStatus::Pending),
            count_for(ReservationStatus::Expired),
            count_for(ReservationStatus::Confirmed),
        );
    }
}
