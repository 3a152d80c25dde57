//! Persistence: the `Store` trait activities and the scheduler use to
//! record their history, plus the startup UTC sanity check (spec §6).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::model::activity_id::ActivityId;
use crate::model::activity_record::ActivityRecord;
use crate::model::target::Target;

/// Errors raised by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("activity {0} not found")]
    ActivityNotFound(ActivityId),

    #[error("backing store I/O error: {0}")]
    Io(String),
}

/// One row of pointing history recorded while an activity runs.
#[derive(Clone, Debug, PartialEq)]
pub struct PointingRecord {
    pub activity_id: ActivityId,
    pub beam_name: String,
    pub ra_rads: f64,
    pub dec_rads: f64,
    pub recorded_at: DateTime<Utc>,
}

/// One row of IFC status history.
#[derive(Clone, Debug, PartialEq)]
pub struct IfcStatusRecord {
    pub activity_id: ActivityId,
    pub ifc_name: String,
    pub status_text: String,
    pub recorded_at: DateTime<Utc>,
}

/// Persists activity records, pointing/IFC history, and exposes the
/// target catalog and failure history the selector and scheduler consult.
///
/// Implementations use `Pin<Box<dyn Future>>`-free `async fn`-in-trait is
/// avoided here since this trait is only ever used behind a concrete type
/// parameter, not as `dyn Store` (spec §6 persistence is always compiled
/// in, never swapped at runtime).
pub trait Store: Send + Sync {
    fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError>;
    fn update_activity(&self, record: &ActivityRecord) -> Result<(), StoreError>;
    fn get_activity(&self, id: ActivityId) -> Result<ActivityRecord, StoreError>;
    fn record_pointing(&self, row: PointingRecord) -> Result<(), StoreError>;
    fn record_ifc_status(&self, row: IfcStatusRecord) -> Result<(), StoreError>;
    fn target_catalog(&self) -> Result<Vec<Target>, StoreError>;
    fn failed_activities_since(&self, since: DateTime<Utc>) -> Result<Vec<ActivityRecord>, StoreError>;
}

/// An in-memory `Store`, used by tests and standalone deployments that
/// don't need durability across restarts.
#[derive(Default)]
pub struct InMemoryStore {
    activities: Mutex<HashMap<i32, ActivityRecord>>,
    pointings: Mutex<Vec<PointingRecord>>,
    ifc_statuses: Mutex<Vec<IfcStatusRecord>>,
    catalog: Mutex<Vec<Target>>,
}

impl InMemoryStore {
    pub fn new(catalog: Vec<Target>) -> Self {
        Self {
            activities: Mutex::new(HashMap::new()),
            pointings: Mutex::new(Vec::new()),
            ifc_statuses: Mutex::new(Vec::new()),
            catalog: Mutex::new(catalog),
        }
    }
}

impl Store for InMemoryStore {
    fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        self.activities.lock().unwrap().insert(record.activity_id.value(), record.clone());
        Ok(())
    }

    fn update_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        let mut activities = self.activities.lock().unwrap();
        if !activities.contains_key(&record.activity_id.value()) {
            return Err(StoreError::ActivityNotFound(record.activity_id));
        }
        activities.insert(record.activity_id.value(), record.clone());
        Ok(())
    }

    fn get_activity(&self, id: ActivityId) -> Result<ActivityRecord, StoreError> {
        self.activities
            .lock()
            .unwrap()
            .get(&id.value())
            .cloned()
            .ok_or(StoreError::ActivityNotFound(id))
    }

    fn record_pointing(&self, row: PointingRecord) -> Result<(), StoreError> {
        self.pointings.lock().unwrap().push(row);
        Ok(())
    }

    fn record_ifc_status(&self, row: IfcStatusRecord) -> Result<(), StoreError> {
        self.ifc_statuses.lock().unwrap().push(row);
        Ok(())
    }

    fn target_catalog(&self) -> Result<Vec<Target>, StoreError> {
        Ok(self.catalog.lock().unwrap().clone())
    }

    fn failed_activities_since(&self, since: DateTime<Utc>) -> Result<Vec<ActivityRecord>, StoreError> {
        Ok(self
            .activities
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.scheduled_start.map(|t| t >= since).unwrap_or(false))
            .filter(|record| record.obs_summary.signals_detected == 0)
            .cloned()
            .collect())
    }
}

/// Verifies the runtime's epoch conversion is UTC-correct before anything
/// is persisted, matching the original system's
/// `FROM_UNIXTIME(0) == '1970-01-01 00:00:00'` startup check.
pub fn verify_utc_epoch() -> Result<(), StoreError> {
    let epoch = Utc.timestamp_opt(0, 0).single().ok_or_else(|| StoreError::Io("epoch conversion failed".to_string()))?;
    if epoch.format("%Y-%m-%d %H:%M:%S").to_string() != "1970-01-01 00:00:00" {
        return Err(StoreError::Io("timestamp epoch does not resolve to 1970-01-01 00:00:00 UTC".to_string()));
    }
    Ok(())
}
