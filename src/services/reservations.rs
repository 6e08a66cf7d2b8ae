use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ReservationError;
use crate::models::{PaymentMethod, Reservation, ReservationStatus, Sale, Seat, Session};
use crate::AppState;

/// Запрос на бронирование: один покупатель, одна сессия, несколько мест.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub seat_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub reservation_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_id: String,
}

pub fn seat_lock_key(seat_id: Uuid) -> String {
    format!("seat:lock:{}", seat_id)
}

// линейный backoff: 100ms, 200ms, 300ms
fn lock_backoff(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_millis(100 * u64::from(attempt))
}

fn validate_payment_input(request: &ConfirmPayment) -> Result<(), ReservationError> {
    // неполные данные платежа - ошибка валидации, не not-found
    if request.reservation_id.is_nil() || request.payment_id.trim().is_empty() {
        return Err(ReservationError::Validation(
            "incomplete payment data".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReservationService {
    state: Arc<AppState>,
}

impl ReservationService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Бронирует каждое место по очереди. Частичный провал роняет весь
    /// вызов, но уже закоммиченные места этого же вызова не компенсируются
    /// (см. DESIGN.md).
    pub async fn create(
        &self,
        request: NewReservation,
    ) -> Result<Vec<Reservation>, ReservationError> {
        if request.seat_ids.is_empty() {
            return Err(ReservationError::Validation(
                "at least one seat is required".to_string(),
            ));
        }

        // сессия проверяется до того, как тронуто хоть одно место
        let session: Option<Session> = sqlx::query_as(
            "SELECT id, movie_title, room, starts_at, ticket_price, is_active, created_at, updated_at
             FROM sessions
             WHERE id = $1 AND is_active = TRUE",
        )
        .bind(request.session_id)
        .fetch_optional(&self.state.db.pool)
        .await?;

        let session = session.ok_or(ReservationError::SessionNotFound(request.session_id))?;

        let mut reservations = Vec::with_capacity(request.seat_ids.len());
        for seat_id in &request.seat_ids {
            let reservation = self
                .reserve_seat_with_lock(
                    request.user_id,
                    request.session_id,
                    *seat_id,
                    session.ticket_price,
                )
                .await?;
            reservations.push(reservation);
        }

        Ok(reservations)
    }

    /// Redis-лок здесь - только фильтр конкуренции перед базой; границей
    /// корректности остаётся row lock внутри транзакции.
    async fn reserve_seat_with_lock(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        seat_id: Uuid,
        price: f64,
    ) -> Result<Reservation, ReservationError> {
        let lock_key = seat_lock_key(seat_id);
        let config = &self.state.config.reservation;

        for attempt in 1..=config.lock_max_retries {
            let lock = self
                .state
                .redis
                .try_lock(&lock_key, config.lock_ttl_seconds)
                .await?;

            let Some(lock) = lock else {
                warn!(
                    "failed to acquire lock for seat {}, attempt {}",
                    seat_id, attempt
                );
                sleep(lock_backoff(attempt)).await;
                continue;
            };

            let result = self
                .reserve_seat_tx(user_id, session_id, seat_id, price)
                .await;
            // лок снимается на любом исходе; отменённую future страхует Drop гарда
            lock.release().await;

            let reservation = result?;

            // уже после коммита: провал публикации бронь не откатывает
            self.state.messaging.reservation_created(&reservation).await;

            info!(
                "seat {} reserved until {} (reservation {})",
                seat_id, reservation.expires_at, reservation.id
            );
            return Ok(reservation);
        }

        Err(ReservationError::Conflict(format!(
            "could not reserve seat {}, try again",
            seat_id
        )))
    }

    async fn reserve_seat_tx(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        seat_id: Uuid,
        price: f64,
    ) -> Result<Reservation, ReservationError> {
        let mut tx = self.state.db.pool.begin().await?;

        // истинная точка сериализации: эксклюзивный row lock места
        let seat: Option<Seat> = sqlx::query_as(
            "SELECT id, session_id, row_letter, seat_number, status, current_reservation_id,
                    reserved_until, is_blocked, created_at, updated_at
             FROM seats
             WHERE id = $1
             FOR UPDATE",
        )
        .bind(seat_id)
        .fetch_optional(&mut *tx)
        .await?;

        let seat = seat.ok_or(ReservationError::SeatNotFound(seat_id))?;

        if seat.is_blocked {
            return Err(ReservationError::SeatBlocked(seat.seat_identifier()));
        }

        let now = Utc::now();
        if !seat.is_available_at(now) {
            return Err(ReservationError::Conflict(format!(
                "seat {} is not available",
                seat.seat_identifier()
            )));
        }

        let expires_at = now + Duration::seconds(self.state.config.reservation.timeout_seconds);

        let reservation: Reservation = sqlx::query_as(
            "INSERT INTO reservations (user_id, session_id, seat_id, status, expires_at, price)
             VALUES ($1, $2, $3, 'pending', $4, $5)
             RETURNING id, user_id, session_id, seat_id, status, expires_at, price,
                       payment_id, confirmed_at, cancelled_at, created_at, updated_at",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(seat_id)
        .bind(expires_at)
        .bind(price)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE seats
             SET status = 'reserved', current_reservation_id = $1, reserved_until = $2,
                 updated_at = NOW()
             WHERE id = $3",
        )
        .bind(reservation.id)
        .bind(expires_at)
        .bind(seat_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reservation)
    }

    /// Превращает PENDING-бронь в продажу. Distributed lock не нужен:
    /// PENDING меняют только sweeper и этот путь, и оба сначала берут
    /// row lock самой брони.
    pub async fn confirm_payment(&self, request: ConfirmPayment) -> Result<Sale, ReservationError> {
        validate_payment_input(&request)?;

        let mut tx = self.state.db.pool.begin().await?;

        let reservation: Option<Reservation> = sqlx::query_as(
            "SELECT id, user_id, session_id, seat_id, status, expires_at, price,
                    payment_id, confirmed_at, cancelled_at, created_at, updated_at
             FROM reservations
             WHERE id = $1
             FOR UPDATE",
        )
        .bind(request.reservation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let reservation = reservation
            .ok_or(ReservationError::ReservationNotFound(request.reservation_id))?;

        let now = Utc::now();
        if !reservation.can_be_confirmed_at(now) {
            // повторное подтверждение отклоняем, а не проводим второй раз
            return Err(ReservationError::NotConfirmable(reservation.id));
        }

        let seat: Option<Seat> = sqlx::query_as(
            "SELECT id, session_id, row_letter, seat_number, status, current_reservation_id,
                    reserved_until, is_blocked, created_at, updated_at
             FROM seats
             WHERE id = $1",
        )
        .bind(reservation.seat_id)
        .fetch_optional(&mut *tx)
        .await?;

        let seat = seat.ok_or(ReservationError::SeatNotFound(reservation.seat_id))?;

        sqlx::query(
            "UPDATE reservations
             SET status = 'confirmed', confirmed_at = $1, payment_id = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(now)
        .bind(&request.payment_id)
        .bind(reservation.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE seats
             SET status = 'sold', current_reservation_id = NULL, reserved_until = NULL,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(seat.id)
        .execute(&mut *tx)
        .await?;

        let sale: Sale = sqlx::query_as(
            "INSERT INTO sales (user_id, session_id, reservation_id, seat_id, seat_identifier,
                                price, payment_method, payment_status, payment_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'approved', $8)
             RETURNING id, user_id, session_id, reservation_id, seat_id, seat_identifier,
                       price, payment_method, payment_status, payment_id, notes, refunded_at,
                       created_at, updated_at",
        )
        .bind(reservation.user_id)
        .bind(reservation.session_id)
        .bind(reservation.id)
        .bind(seat.id)
        .bind(seat.seat_identifier())
        .bind(reservation.price)
        .bind(request.payment_method)
        .bind(&request.payment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.state.messaging.payment_confirmed(&sale).await;

        info!(
            "reservation {} confirmed, seat {} sold (sale {})",
            reservation.id,
            seat.seat_identifier(),
            sale.id
        );
        Ok(sale)
    }

    /// Явная отмена покупателем: та же форма перехода, что и у expiry.
    pub async fn cancel(&self, reservation_id: Uuid) -> Result<(), ReservationError> {
        let mut tx = self.state.db.pool.begin().await?;

        let reservation: Option<Reservation> = sqlx::query_as(
            "SELECT id, user_id, session_id, seat_id, status, expires_at, price,
                    payment_id, confirmed_at, cancelled_at, created_at, updated_at
             FROM reservations
             WHERE id = $1
             FOR UPDATE",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let reservation =
            reservation.ok_or(ReservationError::ReservationNotFound(reservation_id))?;

        if reservation.status != ReservationStatus::Pending {
            return Err(ReservationError::NotConfirmable(reservation.id));
        }

        sqlx::query(
            "UPDATE reservations
             SET status = 'cancelled', cancelled_at = $1, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(reservation.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE seats
             SET status = 'available', current_reservation_id = NULL, reserved_until = NULL,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(reservation.seat_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.state
            .messaging
            .seat_released(reservation.seat_id, reservation.id)
            .await;

        info!(
            "reservation {} cancelled, seat {} released",
            reservation.id, reservation.seat_id
        );
        Ok(())
    }

    /// Изолированная транзакция sweeper'а для одной брони. Перечитывание
    /// под row lock обязательно: подтверждение могло закоммититься первым,
    /// и тогда истечение - no-op.
    pub async fn expire_reservation(&self, reservation_id: Uuid) -> Result<(), ReservationError> {
        let mut tx = self.state.db.pool.begin().await?;

        let reservation: Option<Reservation> = sqlx::query_as(
            "SELECT id, user_id, session_id, seat_id, status, expires_at, price,
                    payment_id, confirmed_at, cancelled_at, created_at, updated_at
             FROM reservations
             WHERE id = $1
             FOR UPDATE",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(reservation) = reservation else {
            warn!("reservation {} vanished before expiry, skipping", reservation_id);
            return Ok(());
        };

        if reservation.status != ReservationStatus::Pending {
            debug!(
                "reservation {} already {:?}, skipping expiry",
                reservation_id, reservation.status
            );
            return Ok(());
        }

        sqlx::query("UPDATE reservations SET status = 'expired', updated_at = NOW() WHERE id = $1")
            .bind(reservation.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE seats
             SET status = 'available', current_reservation_id = NULL, reserved_until = NULL,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(reservation.seat_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.state
            .messaging
            .reservation_expired(reservation.id, reservation.seat_id)
            .await;

        info!(
            "reservation {} expired, seat {} released",
            reservation.id, reservation.seat_id
        );
        Ok(())
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Reservation>, ReservationError> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT id, user_id, session_id, seat_id, status, expires_at, price,
                    payment_id, confirmed_at, cancelled_at, created_at, updated_at
             FROM reservations
             WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.state.db.pool)
        .await?;
        Ok(reservations)
    }

    pub async fn find_one(&self, id: Uuid) -> Result<Reservation, ReservationError> {
        let reservation: Option<Reservation> = sqlx::query_as(
            "SELECT id, user_id, session_id, seat_id, status, expires_at, price,
                    payment_id, confirmed_at, cancelled_at, created_at, updated_at
             FROM reservations
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.state.db.pool)
        .await?;
        reservation.ok_or(ReservationError::ReservationNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_scoped_per_seat() {
        let seat_id = Uuid::new_v4();
        assert_eq!(seat_lock_key(seat_id), format!("seat:lock:{}", seat_id));
    }

    #[test]
    fn backoff_grows_linearly_with_attempts() {
        assert_eq!(lock_backoff(1), std::time::Duration::from_millis(100));
        assert_eq!(lock_backoff(2), std::time::Duration::from_millis(200));
        assert_eq!(lock_backoff(3), std::time::Duration::from_millis(300));
    }

    #[test]
    fn blank_payment_id_is_a_validation_error() {
        let request = ConfirmPayment {
            reservation_id: Uuid::new_v4(),
            payment_method: PaymentMethod::Pix,
            payment_id: "   ".to_string(),
        };
        assert!(matches!(
            validate_payment_input(&request),
            Err(ReservationError::Validation(_))
        ));
    }

    #[test]
    fn nil_reservation_id_is_a_validation_error() {
        let request = ConfirmPayment {
            reservation_id: Uuid::nil(),
            payment_method: PaymentMethod::Cash,
            payment_id: "pay_1".to_string(),
        };
        assert!(matches!(
            validate_payment_input(&request),
            Err(ReservationError::Validation(_))
        ));
    }

    #[test]
    fn complete_payment_input_passes_validation() {
        let request = ConfirmPayment {
            reservation_id: Uuid::new_v4(),
            payment_method: PaymentMethod::Pix,
            payment_id: "pay_1".to_string(),
        };
        assert!(validate_payment_input(&request).is_ok());
    }
}
