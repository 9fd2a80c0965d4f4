use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::driver::{DriverRecord, DriverSnapshot, DriverStatus, GeoPoint};

/// In-memory table of currently-known drivers, keyed by driver id. Every
/// method mutates synchronously (no await points), so each call is an atomic
/// section with respect to other connection handlers. Durable writes and
/// broadcasts are the caller's responsibility.
pub struct PresenceRegistry {
    drivers: DashMap<String, DriverRecord>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
        }
    }

    /// Insert or replace the record for a driver, marking it live and bound
    /// to the given connection.
    pub fn register(
        &self,
        driver_id: &str,
        driver_name: &str,
        location: GeoPoint,
        vehicle_type: String,
        connection_id: Uuid,
    ) -> DriverRecord {
        let record = DriverRecord {
            driver_id: driver_id.to_string(),
            driver_name: driver_name.to_string(),
            location,
            vehicle_type,
            status: DriverStatus::Live,
            is_online: true,
            last_update: Utc::now(),
            connection_id,
        };

        self.drivers.insert(driver_id.to_string(), record.clone());
        record
    }

    /// Update a known driver's location, refreshing its timestamp and
    /// forcing it back online. Returns `None` for unknown drivers.
    pub fn update_location(&self, driver_id: &str, lat: f64, lng: f64) -> Option<DriverRecord> {
        let mut entry = self.drivers.get_mut(driver_id)?;
        entry.location = GeoPoint { lat, lng };
        entry.last_update = Utc::now();
        entry.is_online = true;
        Some(entry.clone())
    }

    /// Refresh the last-activity timestamp and online flag only.
    pub fn heartbeat(&self, driver_id: &str) -> bool {
        match self.drivers.get_mut(driver_id) {
            Some(mut entry) => {
                entry.last_update = Utc::now();
                entry.is_online = true;
                true
            }
            None => false,
        }
    }

    /// Move a driver between `Live` and `OnRide` on ride transitions. The
    /// driver stays online; the activity timestamp is left untouched.
    pub fn set_status(&self, driver_id: &str, status: DriverStatus) -> bool {
        match self.drivers.get_mut(driver_id) {
            Some(mut entry) => {
                entry.status = status;
                entry.is_online = true;
                true
            }
            None => false,
        }
    }

    /// Flag a driver offline without deleting the record, so a quick
    /// reconnect finds it again. Returns the updated record for the final
    /// durable location write.
    pub fn mark_offline(&self, driver_id: &str) -> Option<DriverRecord> {
        let mut entry = self.drivers.get_mut(driver_id)?;
        entry.is_online = false;
        entry.status = DriverStatus::Offline;
        Some(entry.clone())
    }

    /// Snapshot of every online driver, in wire form.
    pub fn list_online(&self) -> Vec<DriverSnapshot> {
        self.drivers
            .iter()
            .filter(|entry| entry.value().is_online)
            .map(|entry| entry.value().snapshot())
            .collect()
    }

    pub fn get(&self, driver_id: &str) -> Option<DriverRecord> {
        self.drivers.get(driver_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Remove every record that is offline and idle for longer than the
    /// threshold. Returns the number removed so the caller can decide
    /// whether to re-broadcast.
    pub fn evict_stale(&self, now: DateTime<Utc>, threshold: Duration) -> usize {
        let cutoff = now - threshold;
        let before = self.drivers.len();
        self.drivers
            .retain(|_, record| record.is_online || record.last_update >= cutoff);
        before - self.drivers.len()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
