use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use chrono::NaiveDate;
use models::{NewReservation, Reservation, ReservationPatch, SpotStatus};
use tracing::{debug, error, info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::errors::ServiceError;
use crate::observability::{
    ACTIVE_RESERVATIONS, CONFLICTS_TOTAL, PERSISTENCE_FAILURES_TOTAL, RESERVATIONS_CANCELLED_TOTAL,
    RESERVATIONS_CREATED_TOTAL, RESERVATIONS_UPDATED_TOTAL,
};
use crate::reservations::repository::ReservationRepository;
use crate::storage::JsonMapStore;

/// Holder recorded by [`ReservationStore::quick_book`].
pub const QUICK_BOOKING_HOLDER: &str = "Quick Booking";

/// Where and how a [`ReservationStore`] keeps its data.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    pub data_file: PathBuf,
    pub backup_file: Option<PathBuf>,
    /// Known spots; empty accepts any well-formed spot id.
    pub spots: Vec<String>,
}

impl StoreOptions {
    pub fn new<P: Into<PathBuf>>(data_file: P) -> Self {
        Self { data_file: data_file.into(), ..Default::default() }
    }
}

impl From<&configs::StorageConfig> for StoreOptions {
    fn from(cfg: &configs::StorageConfig) -> Self {
        Self {
            data_file: cfg.data_file.clone(),
            backup_file: cfg.backup_file.clone(),
            spots: cfg.spots.clone(),
        }
    }
}

/// Reservations keyed by spot id, at most one per spot, persisted as a
/// single JSON object after every change.
pub struct ReservationStore {
    store: JsonMapStore<String, Reservation>,
    catalog: BTreeSet<String>,
    clock: Arc<dyn Clock>,
}

impl ReservationStore {
    /// Open the store on the wall clock.
    pub async fn open(options: StoreOptions) -> Result<Arc<Self>, ServiceError> {
        Self::open_with_clock(options, Arc::new(SystemClock)).await
    }

    /// Load and check every stored record. Records that break the field
    /// rules make the whole file unusable rather than being dropped.
    pub async fn open_with_clock(options: StoreOptions, clock: Arc<dyn Clock>) -> Result<Arc<Self>, ServiceError> {
        let store = JsonMapStore::<String, Reservation>::open(options.data_file.clone())
            .await?
            .with_backup(options.backup_file.clone());

        for (key, rec) in store.snapshot().iter() {
            rec.check_stored(key).map_err(|e| {
                ServiceError::persistence(&format!("invalid record in {}", options.data_file.display()), e)
            })?;
        }

        let catalog: BTreeSet<String> = options.spots.iter().map(|s| s.trim().to_string()).collect();
        ACTIVE_RESERVATIONS.set(store.len() as i64);
        info!(
            data_file = %options.data_file.display(),
            reservations = store.len(),
            catalog = catalog.len(),
            backup = options.backup_file.is_some(),
            "reservation store opened"
        );
        Ok(Arc::new(Self { store, catalog, clock }))
    }

    /// All reservations, ordered by spot id.
    pub fn list(&self) -> Vec<Reservation> {
        self.store.snapshot().values().cloned().collect()
    }

    pub fn get(&self, spot_id: &str) -> Result<Reservation, ServiceError> {
        self.store
            .get(&spot_id.trim().to_string())
            .ok_or_else(|| ServiceError::not_found(&format!("reservation for spot {}", spot_id.trim())))
    }

    /// Every catalog spot plus any reserved spot outside the catalog.
    pub fn availability(&self) -> Vec<SpotStatus> {
        let snapshot = self.store.snapshot();
        let spots: BTreeSet<&String> = self.catalog.iter().chain(snapshot.keys()).collect();
        spots
            .into_iter()
            .map(|spot_id| SpotStatus { spot_id: spot_id.clone(), reservation: snapshot.get(spot_id).cloned() })
            .collect()
    }

    #[instrument(skip(self, holder_name))]
    pub async fn create(&self, spot_id: &str, holder_name: &str, reservation_date: NaiveDate) -> Result<Reservation, ServiceError> {
        let result = self.create_inner(NewReservation::new(spot_id, holder_name, reservation_date)).await;
        if result.is_ok() {
            RESERVATIONS_CREATED_TOTAL.inc();
        }
        self.observe("create", spot_id, &result);
        result
    }

    /// Reserve `spot_id` for today under [`QUICK_BOOKING_HOLDER`].
    pub async fn quick_book(&self, spot_id: &str) -> Result<Reservation, ServiceError> {
        let today = self.clock.today();
        self.create(spot_id, QUICK_BOOKING_HOLDER, today).await
    }

    async fn create_inner(&self, input: NewReservation) -> Result<Reservation, ServiceError> {
        let input = input.normalized(self.clock.today())?;
        self.ensure_in_catalog(&input.spot_id)?;
        let created_at = self.clock.now();

        self.store
            .update_map(move |map| {
                if map.contains_key(&input.spot_id) {
                    return Err(ServiceError::Conflict(format!("spot {} is already reserved", input.spot_id)));
                }
                let rec = Reservation {
                    spot_id: input.spot_id,
                    holder_name: input.holder_name,
                    reservation_date: input.reservation_date,
                    created_at,
                };
                map.insert(rec.spot_id.clone(), rec.clone());
                Ok(rec)
            })
            .await
    }

    /// Overwrite the supplied fields. With neither field supplied this is a
    /// lookup and nothing is written.
    #[instrument(skip(self, holder_name))]
    pub async fn update(
        &self,
        spot_id: &str,
        holder_name: Option<&str>,
        reservation_date: Option<NaiveDate>,
    ) -> Result<Reservation, ServiceError> {
        let patch = ReservationPatch { holder_name: holder_name.map(str::to_string), reservation_date };
        if patch.is_empty() {
            return self.get(spot_id);
        }
        let result = self.update_inner(spot_id.trim().to_string(), patch).await;
        if result.is_ok() {
            RESERVATIONS_UPDATED_TOTAL.inc();
        }
        self.observe("update", spot_id, &result);
        result
    }

    async fn update_inner(&self, spot_id: String, patch: ReservationPatch) -> Result<Reservation, ServiceError> {
        let patch = patch.normalized(self.clock.today()).map_err(ServiceError::from);
        self.store
            .update_map(move |map| {
                let existing = map
                    .get_mut(&spot_id)
                    .ok_or_else(|| ServiceError::not_found(&format!("reservation for spot {spot_id}")))?;
                let patch = patch?;
                patch.apply_to(existing);
                Ok(existing.clone())
            })
            .await
    }

    /// Cancel the reservation on `spot_id`.
    #[instrument(skip(self))]
    pub async fn delete(&self, spot_id: &str) -> Result<(), ServiceError> {
        let key = spot_id.trim().to_string();
        let result = self
            .store
            .update_map(|map| {
                map.remove(&key)
                    .map(|_| ())
                    .ok_or_else(|| ServiceError::not_found(&format!("reservation for spot {key}")))
            })
            .await;
        if result.is_ok() {
            RESERVATIONS_CANCELLED_TOTAL.inc();
        }
        self.observe("delete", spot_id, &result);
        result
    }

    fn ensure_in_catalog(&self, spot_id: &str) -> Result<(), ServiceError> {
        if self.catalog.is_empty() || self.catalog.contains(spot_id) {
            Ok(())
        } else {
            Err(ServiceError::InvalidInput(format!("spot {spot_id} is not a known parking spot")))
        }
    }

    fn observe<T>(&self, op: &'static str, spot_id: &str, result: &Result<T, ServiceError>) {
        match result {
            Ok(_) => {
                ACTIVE_RESERVATIONS.set(self.store.len() as i64);
                info!(op, spot_id, "reservation {op} applied");
            }
            Err(e @ ServiceError::Conflict(_)) => {
                CONFLICTS_TOTAL.inc();
                info!(op, spot_id, code = e.code(), "double booking rejected");
            }
            Err(e @ ServiceError::PersistenceFailure(_)) => {
                PERSISTENCE_FAILURES_TOTAL.inc();
                error!(op, spot_id, code = e.code(), error = %e, "reservation file write failed; change discarded");
            }
            Err(e) => {
                debug!(op, spot_id, code = e.code(), error = %e, "reservation request rejected");
            }
        }
    }
}

#[async_trait::async_trait]
impl ReservationRepository for ReservationStore {
    async fn list(&self) -> Vec<Reservation> { self.list() }
    async fn get(&self, spot_id: &str) -> Result<Reservation, ServiceError> { self.get(spot_id) }
    async fn create(&self, spot_id: &str, holder_name: &str, reservation_date: NaiveDate) -> Result<Reservation, ServiceError> {
        self.create(spot_id, holder_name, reservation_date).await
    }
    async fn update(&self, spot_id: &str, holder_name: Option<&str>, reservation_date: Option<NaiveDate>) -> Result<Reservation, ServiceError> {
        self.update(spot_id, holder_name, reservation_date).await
    }
    async fn delete(&self, spot_id: &str) -> Result<(), ServiceError> { self.delete(spot_id).await }
    async fn availability(&self) -> Vec<SpotStatus> { self.availability() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 20).expect("date")
    }

    async fn setup_store(spots: &[&str]) -> anyhow::Result<(tempfile::TempDir, Arc<ReservationStore>)> {
        let dir = tempfile::tempdir()?;
        let options = StoreOptions {
            data_file: dir.path().join("reservations.json"),
            backup_file: None,
            spots: spots.iter().map(|s| s.to_string()).collect(),
        };
        let store = ReservationStore::open_with_clock(options, Arc::new(FixedClock::on(today()))).await?;
        Ok((dir, store))
    }

    #[tokio::test]
    async fn double_booking_is_rejected() -> anyhow::Result<()> {
        let (_dir, store) = setup_store(&[]).await?;
        let first = today() + Duration::days(11);

        let created = store.create("A1", "Jan Novak", first).await?;
        assert_eq!(created.created_at, FixedClock::on(today()).now());

        let second = store.create("A1", "Marie S", first + Duration::days(1)).await;
        assert!(matches!(second, Err(ServiceError::Conflict(_))));

        let all = store.list();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].spot_id, "A1");
        assert_eq!(all[0].holder_name, "Jan Novak");
        assert_eq!(store.get("A1")?, created);
        Ok(())
    }

    #[tokio::test]
    async fn create_validates_fields() -> anyhow::Result<()> {
        let (_dir, store) = setup_store(&[]).await?;
        let date = today();

        for (spot, name, when) in [
            ("A 1", "Jan Novak", date),
            ("A1", "J", date),
            ("A1", "<b>Jan</b>", date),
            ("A1", "Jan Novak", date - Duration::days(1)),
        ] {
            let res = store.create(spot, name, when).await;
            assert!(matches!(res, Err(ServiceError::InvalidInput(_))), "{spot:?} {name:?} {when}");
        }
        assert!(store.list().is_empty());

        // today is allowed; names are stored trimmed
        let rec = store.create("A1", "  Jan Novak  ", date).await?;
        assert_eq!(rec.holder_name, "Jan Novak");
        Ok(())
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() -> anyhow::Result<()> {
        let (_dir, store) = setup_store(&[]).await?;
        let date = today() + Duration::days(3);
        let created = store.create("B2", "Jan Novak", date).await?;

        let renamed = store.update("B2", Some("Eva Kralova"), None).await?;
        assert_eq!(renamed.holder_name, "Eva Kralova");
        assert_eq!(renamed.reservation_date, date);
        assert_eq!(renamed.created_at, created.created_at);

        let moved = store.update("B2", None, Some(date + Duration::days(1))).await?;
        assert_eq!(moved.holder_name, "Eva Kralova");
        assert_eq!(moved.reservation_date, date + Duration::days(1));

        let unchanged = store.update("B2", None, None).await?;
        assert_eq!(unchanged, moved);

        let bad = store.update("B2", Some("x"), None).await;
        assert!(matches!(bad, Err(ServiceError::InvalidInput(_))));
        let past = store.update("B2", None, Some(today() - Duration::days(1))).await;
        assert!(matches!(past, Err(ServiceError::InvalidInput(_))));
        assert_eq!(store.get("B2")?, moved);
        Ok(())
    }

    #[tokio::test]
    async fn missing_spot_is_not_found_and_changes_nothing() -> anyhow::Result<()> {
        let (dir, store) = setup_store(&[]).await?;
        store.create("C1", "Jan Novak", today()).await?;
        let before = tokio::fs::read(dir.path().join("reservations.json")).await?;

        assert!(matches!(store.get("C2"), Err(ServiceError::NotFound(_))));
        assert!(matches!(store.update("C2", Some("Eva K"), None).await, Err(ServiceError::NotFound(_))));
        // existence is checked before field validity
        assert!(matches!(store.update("C2", Some("x"), None).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(store.delete("C2").await, Err(ServiceError::NotFound(_))));

        assert_eq!(store.list().len(), 1);
        assert_eq!(tokio::fs::read(dir.path().join("reservations.json")).await?, before);
        Ok(())
    }

    #[tokio::test]
    async fn delete_frees_the_spot() -> anyhow::Result<()> {
        let (_dir, store) = setup_store(&[]).await?;
        store.create("A2", "Jan Novak", today()).await?;
        store.delete("A2").await?;
        assert!(store.list().is_empty());
        assert!(matches!(store.delete("A2").await, Err(ServiceError::NotFound(_))));
        store.create("A2", "Marie S", today()).await?;
        assert_eq!(store.get("A2")?.holder_name, "Marie S");
        Ok(())
    }

    #[tokio::test]
    async fn catalog_limits_spots_and_drives_availability() -> anyhow::Result<()> {
        let (_dir, store) = setup_store(&["A1", "A2", "B1"]).await?;
        let res = store.create("Z9", "Jan Novak", today()).await;
        assert!(matches!(res, Err(ServiceError::InvalidInput(_))));

        store.create("A2", "Jan Novak", today()).await?;
        let view = store.availability();
        let summary: Vec<(&str, bool)> = view.iter().map(|s| (s.spot_id.as_str(), s.is_free())).collect();
        assert_eq!(summary, vec![("A1", true), ("A2", false), ("B1", true)]);
        assert_eq!(
            view[1].reservation.as_ref().map(|r| r.holder_name.as_str()),
            Some("Jan Novak")
        );
        Ok(())
    }

    #[tokio::test]
    async fn quick_book_reserves_today() -> anyhow::Result<()> {
        let (_dir, store) = setup_store(&[]).await?;
        let rec = store.quick_book("B3").await?;
        assert_eq!(rec.holder_name, QUICK_BOOKING_HOLDER);
        assert_eq!(rec.reservation_date, today());
        assert!(matches!(store.quick_book("B3").await, Err(ServiceError::Conflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn reload_reproduces_mapping() -> anyhow::Result<()> {
        let (dir, store) = setup_store(&[]).await?;
        store.create("A1", "Jan Novak", today()).await?;
        store.create("B1", "Marie S", today() + Duration::days(2)).await?;
        store.update("A1", Some("Jan Novák"), None).await?;

        let options = StoreOptions::new(dir.path().join("reservations.json"));
        let reloaded = ReservationStore::open_with_clock(options, Arc::new(FixedClock::on(today()))).await?;
        assert_eq!(reloaded.list(), store.list());
        Ok(())
    }

    #[tokio::test]
    async fn stored_record_under_wrong_key_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reservations.json");
        let raw = r#"{"A1":{"place":"B7","name":"Jan Novak","reservation_date":"2026-07-01","created_at":"2026-06-20T10:00:00Z"}}"#;
        tokio::fs::write(&path, raw).await?;

        let res = ReservationStore::open(StoreOptions::new(&path)).await;
        assert!(matches!(res, Err(ServiceError::PersistenceFailure(_))));
        Ok(())
    }

    #[tokio::test]
    async fn availability_includes_reserved_spots_outside_catalog() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reservations.json");
        let raw = r#"{"Z9":{"place":"Z9","name":"Jan Novak","reservation_date":"2026-07-01","created_at":"2026-06-20T10:00:00Z"}}"#;
        tokio::fs::write(&path, raw).await?;

        let options = StoreOptions {
            data_file: path,
            backup_file: None,
            spots: vec!["B1".into(), "A1".into()],
        };
        let store = ReservationStore::open_with_clock(options, Arc::new(FixedClock::on(today()))).await?;

        let view = store.availability();
        let summary: Vec<(&str, bool)> = view.iter().map(|s| (s.spot_id.as_str(), s.is_free())).collect();
        assert_eq!(summary, vec![("A1", true), ("B1", true), ("Z9", false)]);
        assert_eq!(view[2].reservation.as_ref().map(|r| r.holder_name.as_str()), Some("Jan Novak"));
        Ok(())
    }

    #[tokio::test]
    async fn works_through_the_trait_object() -> anyhow::Result<()> {
        let (_dir, store) = setup_store(&["A1"]).await?;
        let repo: Arc<dyn ReservationRepository> = store;
        repo.create("A1", "Jan Novak", today()).await?;
        assert_eq!(repo.get("A1").await?.holder_name, "Jan Novak");
        assert_eq!(repo.list().await.len(), 1);
        assert!(!repo.availability().await[0].is_free());
        repo.update("A1", Some("Eva K"), None).await?;
        repo.delete("A1").await?;
        assert!(repo.list().await.is_empty());
        Ok(())
    }
}
