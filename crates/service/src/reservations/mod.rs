//! Parking spot reservations: the repository contract and its JSON-file
//! implementation.

pub mod repository;
pub mod store;

pub use repository::ReservationRepository;
pub use store::{ReservationStore, StoreOptions, QUICK_BOOKING_HOLDER};
