use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::KafkaConfig;
use crate::models::{Reservation, Sale};

pub const TOPIC_RESERVATION_CREATED: &str = "reservation.created";
pub const TOPIC_PAYMENT_CONFIRMED: &str = "payment.confirmed";
pub const TOPIC_RESERVATION_EXPIRED: &str = "reservation.expired";
pub const TOPIC_SEAT_RELEASED: &str = "seat.released";

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

// Kafka producer для событий жизненного цикла брони
#[derive(Clone)]
pub struct MessagingService {
    producer: FutureProducer,
}

impl MessagingService {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", "5000")
            .set("acks", "1")
            .create()?;

        info!("Kafka producer created for {}", config.brokers);
        Ok(Self { producer })
    }

    /// Отправка в топик. Ключ - id сущности: порядок сохраняется per-key,
    /// доставка at-least-once.
    pub async fn publish(&self, topic: &str, key: &str, message: &Value) -> Result<(), KafkaError> {
        let payload = message.to_string();
        let record = FutureRecord::to(topic).key(key).payload(payload.as_str());

        match self.producer.send(record, Timeout::After(SEND_TIMEOUT)).await {
            Ok((partition, offset)) => {
                debug!(
                    "published to {} (partition {}, offset {})",
                    topic, partition, offset
                );
                Ok(())
            }
            Err((e, _)) => Err(e),
        }
    }

    // === fire-and-forget: провал публикации только логируется ===

    pub async fn reservation_created(&self, reservation: &Reservation) {
        let payload = reservation_created_payload(reservation);
        self.publish_logged(TOPIC_RESERVATION_CREATED, reservation.id, &payload)
            .await;
    }

    pub async fn payment_confirmed(&self, sale: &Sale) {
        let payload = payment_confirmed_payload(sale);
        self.publish_logged(TOPIC_PAYMENT_CONFIRMED, sale.reservation_id, &payload)
            .await;
    }

    pub async fn reservation_expired(&self, reservation_id: Uuid, seat_id: Uuid) {
        let payload = reservation_expired_payload(reservation_id, seat_id);
        self.publish_logged(TOPIC_RESERVATION_EXPIRED, reservation_id, &payload)
            .await;
    }

    pub async fn seat_released(&self, seat_id: Uuid, reservation_id: Uuid) {
        let payload = seat_released_payload(seat_id, reservation_id);
        self.publish_logged(TOPIC_SEAT_RELEASED, seat_id, &payload).await;
    }

    async fn publish_logged(&self, topic: &str, key: Uuid, payload: &Value) {
        if let Err(e) = self.publish(topic, &key.to_string(), payload).await {
            // состояние уже закоммичено; событие терять можно, откатывать - нет
            error!("failed to publish to {}: {}", topic, e);
        }
    }
}

// Конверты событий вынесены в чистые функции, чтобы накрыть их тестами.

fn envelope(id: Uuid, event: &str, data: Value) -> Value {
    json!({
        "id": id,
        "event": event,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

pub fn reservation_created_payload(reservation: &Reservation) -> Value {
    envelope(
        reservation.id,
        "reservation.created",
        json!({
            "reservationId": reservation.id,
            "userId": reservation.user_id,
            "sessionId": reservation.session_id,
            "seatId": reservation.seat_id,
            "expiresAt": reservation.expires_at.to_rfc3339(),
        }),
    )
}

pub fn payment_confirmed_payload(sale: &Sale) -> Value {
    envelope(
        sale.reservation_id,
        "payment.confirmed",
        json!({
            "saleId": sale.id,
            "userId": sale.user_id,
            "seatId": sale.seat_id,
        }),
    )
}

pub fn reservation_expired_payload(reservation_id: Uuid, seat_id: Uuid) -> Value {
    envelope(
        reservation_id,
        "reservation.expired",
        json!({
            "seatId": seat_id,
        }),
    )
}

pub fn seat_released_payload(seat_id: Uuid, reservation_id: Uuid) -> Value {
    envelope(
        seat_id,
        "seat.released",
        json!({
            "seatId": seat_id,
            "reservationId": reservation_id,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, PaymentStatus, ReservationStatus};
    use chrono::Duration;

    fn reservation() -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            seat_id: Uuid::new_v4(),
            status: ReservationStatus::Pending,
            expires_at: now + Duration::seconds(30),
            price: 25.0,
            payment_id: None,
            confirmed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn created_payload_carries_the_contract_fields() {
        let r = reservation();
        let payload = reservation_created_payload(&r);

        assert_eq!(payload["event"], "reservation.created");
        assert_eq!(payload["id"], json!(r.id));
        assert_eq!(payload["data"]["reservationId"], json!(r.id));
        assert_eq!(payload["data"]["userId"], json!(r.user_id));
        assert_eq!(payload["data"]["sessionId"], json!(r.session_id));
        assert_eq!(payload["data"]["seatId"], json!(r.seat_id));
        assert!(payload["data"]["expiresAt"].is_string());
        assert!(payload["timestamp"].is_string());
    }

    #[test]
    fn confirmed_payload_is_keyed_by_reservation() {
        let r = reservation();
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4(),
            user_id: r.user_id,
            session_id: r.session_id,
            reservation_id: r.id,
            seat_id: r.seat_id,
            seat_identifier: "A7".to_string(),
            price: r.price,
            payment_method: PaymentMethod::Pix,
            payment_status: PaymentStatus::Approved,
            payment_id: Some("pay_1".to_string()),
            notes: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };

        let payload = payment_confirmed_payload(&sale);
        assert_eq!(payload["event"], "payment.confirmed");
        assert_eq!(payload["id"], json!(r.id));
        assert_eq!(payload["data"]["saleId"], json!(sale.id));
        assert_eq!(payload["data"]["userId"], json!(sale.user_id));
        assert_eq!(payload["data"]["seatId"], json!(sale.seat_id));
    }

    #[test]
    fn expired_payload_names_the_released_seat() {
        let reservation_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        let payload = reservation_expired_payload(reservation_id, seat_id);
        assert_eq!(payload["event"], "reservation.expired");
        assert_eq!(payload["id"], json!(reservation_id));
        assert_eq!(payload["data"]["seatId"], json!(seat_id));
    }
}
