use async_trait::async_trait;
use chrono::NaiveDate;
use models::{Reservation, SpotStatus};

use crate::errors::ServiceError;

/// Contract exposed to whatever presents reservations to users.
/// Implementations own the reservations; callers only ever get copies.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn list(&self) -> Vec<Reservation>;
    async fn get(&self, spot_id: &str) -> Result<Reservation, ServiceError>;
    async fn create(&self, spot_id: &str, holder_name: &str, reservation_date: NaiveDate) -> Result<Reservation, ServiceError>;
    async fn update(&self, spot_id: &str, holder_name: Option<&str>, reservation_date: Option<NaiveDate>) -> Result<Reservation, ServiceError>;
    async fn delete(&self, spot_id: &str) -> Result<(), ServiceError>;
    async fn availability(&self) -> Vec<SpotStatus>;
}
