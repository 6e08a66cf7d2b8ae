use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ReservationError;
use crate::models::{Seat, SeatStatus};
use crate::AppState;

/// Сводка доступности мест одной сессии.
#[derive(Debug, Serialize)]
pub struct SeatsAvailability {
    pub session_id: Uuid,
    pub total_seats: usize,
    pub available_seats: usize,
    pub reserved_seats: usize,
    pub sold_seats: usize,
    pub seats: Vec<Seat>,
}

#[derive(Clone)]
pub struct SeatService {
    state: Arc<AppState>,
}

impl SeatService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn find_by_session(&self, session_id: Uuid) -> Result<Vec<Seat>, ReservationError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, session_id, row_letter, seat_number, status, current_reservation_id,
                    reserved_until, is_blocked, created_at, updated_at
             FROM seats
             WHERE session_id = $1
             ORDER BY row_letter, seat_number",
        )
        .bind(session_id)
        .fetch_all(&self.state.db.pool)
        .await?;
        Ok(seats)
    }

    pub async fn find_one(&self, seat_id: Uuid) -> Result<Seat, ReservationError> {
        let seat: Option<Seat> = sqlx::query_as(
            "SELECT id, session_id, row_letter, seat_number, status, current_reservation_id,
                    reserved_until, is_blocked, created_at, updated_at
             FROM seats
             WHERE id = $1",
        )
        .bind(seat_id)
        .fetch_optional(&self.state.db.pool)
        .await?;
        seat.ok_or(ReservationError::SeatNotFound(seat_id))
    }

    /// Read-path self-heal: RESERVED с истёкшим reserved_until показываем
    /// свободным и возвращаем в AVAILABLE до подсчёта. Пишем без локов:
    /// guarded UPDATE только выводит строку из протухшего состояния и
    /// никогда не бронирует заново, поэтому проигранная гонка со sweeper'ом
    /// или новой бронью безобидна.
    pub async fn get_availability(
        &self,
        session_id: Uuid,
    ) -> Result<SeatsAvailability, ReservationError> {
        let mut seats = self.find_by_session(session_id).await?;
        let now = Utc::now();

        for seat in &mut seats {
            if !seat.holds_stale_reservation_at(now) {
                continue;
            }

            let released = sqlx::query(
                "UPDATE seats
                 SET status = 'available', current_reservation_id = NULL, reserved_until = NULL,
                     updated_at = NOW()
                 WHERE id = $1 AND status = 'reserved' AND reserved_until < NOW()",
            )
            .bind(seat.id)
            .execute(&self.state.db.pool)
            .await
            .map(|r| r.rows_affected() > 0)
            .unwrap_or(false);

            if !released {
                // строку уже поправил sweeper или перехватила новая бронь;
                // следующий запрос увидит согласованное состояние
                debug!("stale seat {} was updated concurrently", seat.id);
            }

            // читателю место в любом случае отдаём свободным
            seat.status = SeatStatus::Available;
            seat.current_reservation_id = None;
            seat.reserved_until = None;
        }

        let total_seats = seats.len();
        let available_seats = seats
            .iter()
            .filter(|s| s.status == SeatStatus::Available)
            .count();
        let reserved_seats = seats
            .iter()
            .filter(|s| s.status == SeatStatus::Reserved)
            .count();
        let sold_seats = seats.iter().filter(|s| s.status == SeatStatus::Sold).count();

        Ok(SeatsAvailability {
            session_id,
            total_seats,
            available_seats,
            reserved_seats,
            sold_seats,
            seats,
        })
    }

    /// Ручной флаг обслуживания. Никогда не снимается автоматически.
    pub async fn set_blocked(
        &self,
        seat_id: Uuid,
        blocked: bool,
    ) -> Result<Seat, ReservationError> {
        let seat: Option<Seat> = sqlx::query_as(
            "UPDATE seats
             SET is_blocked = $1, updated_at = NOW()
             WHERE id = $2
             RETURNING id, session_id, row_letter, seat_number, status, current_reservation_id,
                       reserved_until, is_blocked, created_at, updated_at",
        )
        .bind(blocked)
        .bind(seat_id)
        .fetch_optional(&self.state.db.pool)
        .await?;
        seat.ok_or(ReservationError::SeatNotFound(seat_id))
    }
}
