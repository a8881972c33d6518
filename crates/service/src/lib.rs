//! Service layer owning parking spot reservations.
//! - `storage` keeps a map as a JSON file with atomic replacement.
//! - `reservations` enforces one reservation per spot on top of it.
//! - Errors are typed (`errors::ServiceError`) and counted in `observability`.

pub mod clock;
pub mod errors;
pub mod observability;
pub mod reservations;
pub mod runtime;
pub mod storage;

pub use reservations::{ReservationRepository, ReservationStore, StoreOptions};
