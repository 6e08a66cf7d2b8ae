use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Reserved,
    Sold,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub session_id: Uuid,
    // A, B, C, D
    pub row_letter: String,
    // 1, 2, 3, 4
    pub seat_number: i32,
    pub status: SeatStatus,
    pub current_reservation_id: Option<Uuid>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    // Видимый идентификатор вида "A7"
    pub fn seat_identifier(&self) -> String {
        format!("{}{}", self.row_letter, self.seat_number)
    }

    /// Правило доступности. RESERVED с истёкшим reserved_until считается
    /// логически свободным, даже если sweeper ещё не прошёл по этой строке.
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_blocked || self.status == SeatStatus::Sold {
            return false;
        }

        match self.status {
            SeatStatus::Available => true,
            SeatStatus::Reserved => match self.reserved_until {
                Some(until) => now > until,
                // reserved без дедлайна - считаем занятым
                None => false,
            },
            SeatStatus::Sold => false,
        }
    }

    /// Просроченная бронь, которую читатель обязан показывать свободной.
    pub fn holds_stale_reservation_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Reserved
            && self.reserved_until.map(|until| now > until).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn seat(
        status: SeatStatus,
        is_blocked: bool,
        reserved_until: Option<DateTime<Utc>>,
    ) -> Seat {
        let now = Utc::now();
        Seat {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            row_letter: "A".to_string(),
            seat_number: 7,
            status,
            current_reservation_id: None,
            reserved_until,
            is_blocked,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn seat_identifier_concatenates_row_and_number() {
        let seat = seat(SeatStatus::Available, false, None);
        assert_eq!(seat.seat_identifier(), "A7");
    }

    #[test]
    fn available_seat_is_available() {
        let now = Utc::now();
        assert!(seat(SeatStatus::Available, false, None).is_available_at(now));
    }

    #[test]
    fn reserved_seat_with_future_deadline_is_taken() {
        let now = Utc::now();
        let seat = seat(SeatStatus::Reserved, false, Some(now + Duration::seconds(30)));
        assert!(!seat.is_available_at(now));
        assert!(!seat.holds_stale_reservation_at(now));
    }

    #[test]
    fn reserved_seat_with_elapsed_deadline_is_logically_available() {
        let now = Utc::now();
        let seat = seat(SeatStatus::Reserved, false, Some(now - Duration::seconds(1)));
        assert!(seat.is_available_at(now));
        assert!(seat.holds_stale_reservation_at(now));
    }

    #[test]
    fn reserved_seat_without_deadline_stays_taken() {
        let now = Utc::now();
        let seat = seat(SeatStatus::Reserved, false, None);
        assert!(!seat.is_available_at(now));
        assert!(!seat.holds_stale_reservation_at(now));
    }

    fn any_status() -> impl Strategy<Value = SeatStatus> {
        prop_oneof![
            Just(SeatStatus::Available),
            Just(SeatStatus::Reserved),
            Just(SeatStatus::Sold),
        ]
    }

    proptest! {
        // блокировка и продажа перекрывают любой reserved_until
        #[test]
        fn blocked_seat_is_never_offered(status in any_status(), offset in -600i64..600i64) {
            let now = Utc::now();
            let seat = seat(status, true, Some(now + Duration::seconds(offset)));
            prop_assert!(!seat.is_available_at(now));
        }

        #[test]
        fn sold_seat_is_never_offered(blocked in any::<bool>(), offset in -600i64..600i64) {
            let now = Utc::now();
            let seat = seat(SeatStatus::Sold, blocked, Some(now + Duration::seconds(offset)));
            prop_assert!(!seat.is_available_at(now));
        }
    }
}
