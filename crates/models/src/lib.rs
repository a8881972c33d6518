//! Record types for parking spot reservations and their field rules.

pub mod errors;
pub mod reservation;

pub use reservation::{NewReservation, Reservation, ReservationPatch, SpotStatus};
