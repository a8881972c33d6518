use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

pub const SPOT_ID_MAX_LEN: usize = 20;
pub const HOLDER_NAME_MIN_LEN: usize = 2;
pub const HOLDER_NAME_MAX_LEN: usize = 50;

/// One active reservation of a parking spot.
///
/// On disk the fields keep the legacy names: `place`, `name`,
/// `reservation_date` (`YYYY-MM-DD`) and `created_at` (RFC 3339).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(rename = "place")]
    pub spot_id: String,
    #[serde(rename = "name")]
    pub holder_name: String,
    pub reservation_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Check a record read back from storage under `key`.
    ///
    /// The date is not compared with today: a reservation made for a day
    /// that has since passed is still a valid stored record.
    pub fn check_stored(&self, key: &str) -> Result<(), ModelError> {
        if self.spot_id != key {
            return Err(ModelError::validation(format!(
                "record stored under {key:?} names spot {:?}",
                self.spot_id
            )));
        }
        validate_spot_id(&self.spot_id)?;
        validate_holder_name(&self.holder_name)?;
        Ok(())
    }
}

/// Creation input; `created_at` is filled by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub spot_id: String,
    pub holder_name: String,
    pub reservation_date: NaiveDate,
}

impl NewReservation {
    pub fn new(spot_id: impl Into<String>, holder_name: impl Into<String>, reservation_date: NaiveDate) -> Self {
        Self { spot_id: spot_id.into(), holder_name: holder_name.into(), reservation_date }
    }

    /// Trim and validate every field against `today`.
    pub fn normalized(self, today: NaiveDate) -> Result<Self, ModelError> {
        let spot_id = self.spot_id.trim().to_string();
        validate_spot_id(&spot_id)?;
        let holder_name = validate_holder_name(&self.holder_name)?;
        validate_reservation_date(self.reservation_date, today)?;
        Ok(Self { spot_id, holder_name, reservation_date: self.reservation_date })
    }
}

/// Partial update; `None` fields are left as they are.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPatch {
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub reservation_date: Option<NaiveDate>,
}

impl ReservationPatch {
    pub fn is_empty(&self) -> bool {
        self.holder_name.is_none() && self.reservation_date.is_none()
    }

    pub fn normalized(self, today: NaiveDate) -> Result<Self, ModelError> {
        let holder_name = self.holder_name.as_deref().map(validate_holder_name).transpose()?;
        if let Some(date) = self.reservation_date {
            validate_reservation_date(date, today)?;
        }
        Ok(Self { holder_name, reservation_date: self.reservation_date })
    }

    /// Overwrite the supplied fields; `spot_id` and `created_at` never change.
    pub fn apply_to(&self, reservation: &mut Reservation) {
        if let Some(name) = &self.holder_name {
            reservation.holder_name = name.clone();
        }
        if let Some(date) = self.reservation_date {
            reservation.reservation_date = date;
        }
    }
}

/// A spot and, when taken, the reservation holding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotStatus {
    pub spot_id: String,
    pub reservation: Option<Reservation>,
}

impl SpotStatus {
    pub fn is_free(&self) -> bool { self.reservation.is_none() }
}

/// `[A-Za-z0-9_-]{1,20}`
pub fn validate_spot_id(spot_id: &str) -> Result<(), ModelError> {
    if spot_id.is_empty() {
        return Err(ModelError::validation("spot id required"));
    }
    if spot_id.len() > SPOT_ID_MAX_LEN {
        return Err(ModelError::validation(format!("spot id longer than {SPOT_ID_MAX_LEN} characters")));
    }
    if !spot_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ModelError::validation("spot id may contain only letters, digits, '_' and '-'"));
    }
    Ok(())
}

/// Returns the trimmed name. Letters may be non-ASCII ("Novák").
pub fn validate_holder_name(holder_name: &str) -> Result<String, ModelError> {
    let name = holder_name.trim();
    let len = name.chars().count();
    if !(HOLDER_NAME_MIN_LEN..=HOLDER_NAME_MAX_LEN).contains(&len) {
        return Err(ModelError::validation(format!(
            "holder name must be {HOLDER_NAME_MIN_LEN}-{HOLDER_NAME_MAX_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_alphabetic() || matches!(c, ' ' | '.' | '-' | '\'')) {
        return Err(ModelError::validation("holder name may contain only letters, spaces, '.', '-' and '''"));
    }
    Ok(name.to_string())
}

pub fn validate_reservation_date(date: NaiveDate, today: NaiveDate) -> Result<(), ModelError> {
    if date < today {
        return Err(ModelError::validation(format!("reservation date {date} is in the past")));
    }
    Ok(())
}
