use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// PENDING - единственное нетерминальное состояние; остальные
/// после записи больше не меняются.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub seat_id: Uuid,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    // цена фиксируется при создании и не следует за изменениями сессии
    pub price: f64,
    pub payment_id: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && now > self.expires_at
    }

    /// Подтверждать можно только PENDING в пределах дедлайна.
    pub fn can_be_confirmed_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && !self.is_expired_at(now)
    }

    pub fn remaining_time_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(status: ReservationStatus, expires_at: DateTime<Utc>) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            seat_id: Uuid::new_v4(),
            status,
            expires_at,
            price: 25.0,
            payment_id: None,
            confirmed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_within_deadline_is_confirmable() {
        let now = Utc::now();
        let r = reservation(ReservationStatus::Pending, now + Duration::seconds(30));
        assert!(r.can_be_confirmed_at(now));
        assert!(!r.is_expired_at(now));
    }

    #[test]
    fn pending_exactly_at_deadline_is_still_confirmable() {
        let now = Utc::now();
        let r = reservation(ReservationStatus::Pending, now);
        assert!(r.can_be_confirmed_at(now));
    }

    #[test]
    fn pending_past_deadline_is_expired_not_confirmable() {
        let now = Utc::now();
        let r = reservation(ReservationStatus::Pending, now - Duration::seconds(1));
        assert!(r.is_expired_at(now));
        assert!(!r.can_be_confirmed_at(now));
    }

    #[test]
    fn terminal_states_are_never_confirmable() {
        let now = Utc::now();
        for status in [
            ReservationStatus::Confirmed,
            ReservationStatus::Expired,
            ReservationStatus::Cancelled,
        ] {
            let r = reservation(status, now + Duration::seconds(30));
            assert!(!r.can_be_confirmed_at(now));
            // is_expired - свойство только PENDING-брони
            assert!(!r.is_expired_at(now + Duration::seconds(60)));
        }
    }

    #[test]
    fn remaining_time_clamps_to_zero() {
        let now = Utc::now();
        let r = reservation(ReservationStatus::Pending, now - Duration::seconds(5));
        assert_eq!(r.remaining_time_at(now), Duration::zero());

        let r = reservation(ReservationStatus::Pending, now + Duration::seconds(5));
        assert_eq!(r.remaining_time_at(now), Duration::seconds(5));
    }
}
