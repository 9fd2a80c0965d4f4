use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriverStatus {
    Live,
    // Lowercase leading letter on the wire, as the clients expect.
    #[serde(rename = "onRide")]
    OnRide,
    Offline,
}

/// In-memory presence record for one driver. Exactly one per driver id;
/// last writer wins on concurrent updates.
#[derive(Debug, Clone)]
pub struct DriverRecord {
    pub driver_id: String,
    pub driver_name: String,
    pub location: GeoPoint,
    pub vehicle_type: String,
    pub status: DriverStatus,
    pub is_online: bool,
    pub last_update: DateTime<Utc>,
    pub connection_id: Uuid,
}

/// Externally-visible reduction of a presence record, as carried by
/// `driverLocationsUpdate` and `nearbyDriversResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSnapshot {
    pub driver_id: String,
    pub name: String,
    pub location: SnapshotLocation,
    pub vehicle_type: String,
    pub status: DriverStatus,
    pub last_update: i64,
}

/// GeoJSON-style `[lng, lat]` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLocation {
    pub coordinates: [f64; 2],
}

impl DriverRecord {
    pub fn snapshot(&self) -> DriverSnapshot {
        DriverSnapshot {
            driver_id: self.driver_id.clone(),
            name: self.driver_name.clone(),
            location: SnapshotLocation {
                coordinates: [self.location.lng, self.location.lat],
            },
            vehicle_type: self.vehicle_type.clone(),
            status: self.status,
            last_update: self.last_update.timestamp_millis(),
        }
    }
}
