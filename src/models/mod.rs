pub mod reservation;
pub mod sale;
pub mod seat;
pub mod session;

pub use reservation::{Reservation, ReservationStatus};
pub use sale::{PaymentMethod, PaymentStatus, Sale};
pub use seat::{Seat, SeatStatus};
pub use session::Session;
