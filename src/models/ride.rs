use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::DriverStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

/// A pickup or drop point as submitted by the rider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideStop {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl RideStop {
    pub fn address_or_default(&self) -> String {
        self.address
            .clone()
            .unwrap_or_else(|| "Selected Location".to_string())
    }
}

/// Inbound `bookRide` payload, field names as the clients send them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRideRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<RideStop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop: Option<RideStop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub want_return: Option<bool>,
}

/// Active ride tracked in memory while it moves through its lifecycle.
/// The record mirrors the durable copy created at booking time and is
/// purged a short delay after completion.
#[derive(Debug, Clone)]
pub struct RideRecord {
    pub ride_id: String,
    pub durable_id: String,
    pub otp: String,
    pub status: RideStatus,
    pub request: BookRideRequest,
    pub driver_id: Option<String>,
    pub driver_name: Option<String>,
    pub final_distance: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RideRecord {
    pub fn user_id(&self) -> Option<&str> {
        self.request.user_id.as_deref()
    }
}

/// Durable form of a ride as handed to the persistence service.
#[derive(Debug, Clone)]
pub struct StoredRide {
    pub durable_id: String,
    pub ride_id: String,
    pub user_id: String,
    pub customer_id: String,
    pub user_name: String,
    pub pickup_address: String,
    pub drop_address: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    pub fare: f64,
    pub ride_type: String,
    pub otp: String,
    pub distance: String,
    pub travel_time: String,
    pub is_return_trip: bool,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
}

/// One driver-location write as handed to the persistence service.
#[derive(Debug, Clone)]
pub struct LocationSample {
    pub driver_id: String,
    pub driver_name: String,
    pub lat: f64,
    pub lng: f64,
    pub vehicle_type: String,
    pub status: DriverStatus,
    pub timestamp: DateTime<Utc>,
}
