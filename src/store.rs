//! Incident storage and the best-effort service boundary.
//!
//! [`IncidentStore`] is the document store collaborator: it returns typed
//! errors. [`IncidentService`] sits in front of it and is what the UI layer
//! calls; every failure there is logged and downgraded to `None`, `false` or
//! an empty list so a flaky network never surfaces as an error dialog.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use log::{debug, info, warn};

use crate::error::{RoadwatchError, Result};
use crate::incident::{user_or_anonymous, IncidentRecord, IncidentType, NewIncident};
use crate::proximity::{incidents_near_point, incidents_near_route, ProximityConfig};
use crate::Coordinate;

/// Persistent collection of incident documents.
///
/// Implementations assign ids and report timestamps on insert. There is no
/// compare-and-swap: concurrent confirmations race and the last write wins.
pub trait IncidentStore: Send + Sync {
    /// Insert a validated report, returning the stored record.
    fn insert(&self, incident: NewIncident) -> impl Future<Output = Result<IncidentRecord>> + Send;

    /// Every incident with `active == true`.
    fn active_incidents(&self) -> impl Future<Output = Result<Vec<IncidentRecord>>> + Send;

    /// Fetch one incident, `None` when the id is unknown.
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<IncidentRecord>>> + Send;

    /// Overwrite the confirmation fields of one incident.
    fn update_confirmations(
        &self,
        id: &str,
        confirmed_by: &[String],
        upvotes: u32,
    ) -> impl Future<Output = Result<()>> + Send;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store used by tests, demos and offline mode.
///
/// Can be switched unavailable to simulate a lost connection.
#[derive(Debug)]
pub struct MemoryIncidentStore {
    records: Mutex<Vec<IncidentRecord>>,
    next_id: AtomicU64,
    available: AtomicBool,
}

impl Default for MemoryIncidentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Seed the store with existing records.
    pub fn with_records(records: Vec<IncidentRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::new()
        }
    }

    /// Simulate the store going offline (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Snapshot of every record, active or not.
    pub fn records(&self) -> Result<Vec<IncidentRecord>> {
        self.check_available()?;
        self.with_lock(|records| records.clone())
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(RoadwatchError::StoreUnavailable("memory store offline".to_string()))
        }
    }

    fn with_lock<T>(&self, f: impl FnOnce(&mut Vec<IncidentRecord>) -> T) -> Result<T> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RoadwatchError::StoreUnavailable("memory store poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

impl IncidentStore for MemoryIncidentStore {
    async fn insert(&self, incident: NewIncident) -> Result<IncidentRecord> {
        self.check_available()?;
        let id = format!("incident-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = incident.into_record(id, Some(SystemTime::now()));
        self.with_lock(|records| records.push(record.clone()))?;
        Ok(record)
    }

    async fn active_incidents(&self) -> Result<Vec<IncidentRecord>> {
        self.check_available()?;
        self.with_lock(|records| records.iter().filter(|r| r.active).cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<IncidentRecord>> {
        self.check_available()?;
        self.with_lock(|records| records.iter().find(|r| r.id == id).cloned())
    }

    async fn update_confirmations(&self, id: &str, confirmed_by: &[String], upvotes: u32) -> Result<()> {
        self.check_available()?;
        self.with_lock(|records| {
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| RoadwatchError::NotFound(id.to_string()))?;
            record.confirmed_by = confirmed_by.to_vec();
            record.upvotes = upvotes;
            Ok(())
        })?
    }
}

// ============================================================================
// Service boundary
// ============================================================================

/// Report, confirm and query incidents on top of a store.
///
/// # Example
/// ```
/// use roadwatch::{Coordinate, IncidentService, IncidentType, MemoryIncidentStore};
///
/// futures::executor::block_on(async {
///     let service = IncidentService::new(MemoryIncidentStore::new());
///     let here = Coordinate::new(-0.1278, 51.5074);
///
///     let id = service
///         .report_incident(IncidentType::Police, here, "checkpoint", Some("driver-1"))
///         .await
///         .unwrap();
///
///     assert!(service.confirm_incident(&id, Some("driver-2")).await);
///     assert!(!service.confirm_incident(&id, Some("driver-2")).await);
///     assert_eq!(service.incidents_near_point(&here, None).await.len(), 1);
/// });
/// ```
pub struct IncidentService<S> {
    store: S,
    config: ProximityConfig,
}

impl<S: IncidentStore> IncidentService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ProximityConfig::default())
    }

    pub fn with_config(store: S, config: ProximityConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    /// Validate and store a new report. Returns the new id, or `None` when
    /// validation or the store fails.
    pub async fn report_incident(
        &self,
        incident_type: IncidentType,
        coordinate: Coordinate,
        description: &str,
        reported_by: Option<&str>,
    ) -> Option<String> {
        let draft = match NewIncident::new(incident_type, coordinate, description, reported_by) {
            Ok(draft) => draft,
            Err(e) => {
                warn!("[IncidentService] Rejected {} report: {}", incident_type.id(), e);
                return None;
            }
        };

        match self.store.insert(draft).await {
            Ok(record) => {
                info!(
                    "[IncidentService] Reported {} {} at ({:.5}, {:.5})",
                    record.incident_type.id(),
                    record.id,
                    record.coordinate.longitude,
                    record.coordinate.latitude
                );
                Some(record.id)
            }
            Err(e) => {
                warn!("[IncidentService] Failed to store {} report: {}", incident_type.id(), e);
                None
            }
        }
    }

    /// Record that `user_id` corroborates incident `id`.
    ///
    /// `true` only when a new confirmation was written. Unknown ids, repeat
    /// confirmations and store failures return `false`.
    pub async fn confirm_incident(&self, id: &str, user_id: Option<&str>) -> bool {
        let user = user_or_anonymous(user_id);

        let mut record = match self.store.get(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("[IncidentService] Confirm: no incident {}", id);
                return false;
            }
            Err(e) => {
                warn!("[IncidentService] Confirm {}: lookup failed: {}", id, e);
                return false;
            }
        };

        if !record.confirm(&user) {
            debug!("[IncidentService] {} already confirmed by {}", id, user);
            return false;
        }

        match self
            .store
            .update_confirmations(id, &record.confirmed_by, record.upvotes)
            .await
        {
            Ok(()) => {
                info!("[IncidentService] {} confirmed ({} upvotes)", id, record.upvotes);
                true
            }
            Err(e) => {
                warn!("[IncidentService] Confirm {}: write failed: {}", id, e);
                false
            }
        }
    }

    /// Current active incidents, empty when the store is unreachable.
    pub async fn active_snapshot(&self) -> Vec<IncidentRecord> {
        match self.store.active_incidents().await {
            Ok(records) => records,
            Err(e) => {
                warn!("[IncidentService] Failed to load incidents: {}", e);
                Vec::new()
            }
        }
    }

    /// Active incidents around `center`, nearest first. `None` uses the
    /// configured point radius.
    pub async fn incidents_near_point(&self, center: &Coordinate, radius_km: Option<f64>) -> Vec<IncidentRecord> {
        let radius = radius_km.unwrap_or(self.config.point_radius_km);
        let snapshot = self.active_snapshot().await;
        incidents_near_point(center, &snapshot, radius)
    }

    /// Active incidents along `route`, nearest first. `None` uses the
    /// configured route radius.
    pub async fn incidents_near_route(&self, route: &[Coordinate], radius_km: Option<f64>) -> Vec<IncidentRecord> {
        if route.is_empty() {
            debug!("[IncidentService] Near-route query without a route");
            return Vec::new();
        }
        let radius = radius_km.unwrap_or(self.config.route_radius_km);
        let snapshot = self.active_snapshot().await;
        incidents_near_route(route, &snapshot, radius)
    }
}
