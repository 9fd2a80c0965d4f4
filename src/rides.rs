use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};

use crate::models::ride::{RideRecord, RideStatus};

/// In-memory table of active rides plus the transient set of ride ids
/// currently mid-booking. Lifecycle transitions are synchronous; records
/// leave the table only through the timed post-completion purge.
pub struct RideStore {
    rides: DashMap<String, RideRecord>,
    inflight: DashSet<String>,
}

impl RideStore {
    pub fn new() -> Self {
        Self {
            rides: DashMap::new(),
            inflight: DashSet::new(),
        }
    }

    /// Mark a ride id as mid-creation. Returns `false` if the id is already
    /// in flight, which rejects a concurrent duplicate submission. This is a
    /// best-effort guard, not a lock: it only excludes submissions that
    /// arrive while the marker is held.
    pub fn begin_inflight(&self, ride_id: &str) -> bool {
        self.inflight.insert(ride_id.to_string())
    }

    /// Clear the in-flight marker. Called on every outcome by the attempt
    /// that inserted it; a rejected duplicate leaves the marker alone.
    pub fn end_inflight(&self, ride_id: &str) {
        self.inflight.remove(ride_id);
    }

    pub fn insert(&self, record: RideRecord) {
        self.rides.insert(record.ride_id.clone(), record);
    }

    pub fn get(&self, ride_id: &str) -> Option<RideRecord> {
        self.rides.get(ride_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, ride_id: &str) -> Option<RideRecord> {
        self.rides.remove(ride_id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    /// `pending -> accepted`, binding the driver. `None` if the ride id is
    /// untracked.
    pub fn mark_accepted(
        &self,
        ride_id: &str,
        driver_id: &str,
        driver_name: &str,
        at: DateTime<Utc>,
    ) -> Option<RideRecord> {
        let mut entry = self.rides.get_mut(ride_id)?;
        entry.status = RideStatus::Accepted;
        entry.driver_id = Some(driver_id.to_string());
        entry.driver_name = Some(driver_name.to_string());
        entry.accepted_at = Some(at);
        Some(entry.clone())
    }

    /// `pending -> rejected`. `None` if the ride id is untracked.
    pub fn mark_rejected(&self, ride_id: &str, at: DateTime<Utc>) -> Option<RideRecord> {
        let mut entry = self.rides.get_mut(ride_id)?;
        entry.status = RideStatus::Rejected;
        entry.rejected_at = Some(at);
        Some(entry.clone())
    }

    /// `accepted -> completed`, recording the final distance. `None` if the
    /// ride id is untracked.
    pub fn mark_completed(
        &self,
        ride_id: &str,
        distance: f64,
        at: DateTime<Utc>,
    ) -> Option<RideRecord> {
        let mut entry = self.rides.get_mut(ride_id)?;
        entry.status = RideStatus::Completed;
        entry.final_distance = Some(distance);
        entry.completed_at = Some(at);
        Some(entry.clone())
    }
}

impl Default for RideStore {
    fn default() -> Self {
        Self::new()
    }
}
