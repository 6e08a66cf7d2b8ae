pub mod reservations;
pub mod seats;
pub mod sweeper;

pub use reservations::{ConfirmPayment, NewReservation, ReservationService};
pub use seats::{SeatService, SeatsAvailability};
pub use sweeper::ExpirationSweeper;
