use serde::{Deserialize, Serialize};

use crate::models::driver::{DriverSnapshot, DriverStatus};
use crate::models::ride::BookRideRequest;

/// Inbound frames, carried as `{"event": ..., "data": {...}}` over the
/// socket. Event and field names match the client protocol exactly.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    RegisterDriver {
        driver_id: String,
        driver_name: String,
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        vehicle_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DriverLiveLocationUpdate {
        driver_id: String,
        driver_name: String,
        lat: f64,
        lng: f64,
    },
    #[serde(rename_all = "camelCase")]
    RequestNearbyDrivers {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        radius: Option<f64>,
    },
    BookRide(BookRideRequest),
    #[serde(rename_all = "camelCase")]
    AcceptRide {
        // Older clients send the id under RAID_ID.
        #[serde(default, alias = "RAID_ID")]
        ride_id: Option<String>,
        driver_id: String,
        driver_name: String,
    },
    #[serde(rename_all = "camelCase")]
    RejectRide { ride_id: String, driver_id: String },
    #[serde(rename_all = "camelCase")]
    CompleteRide {
        ride_id: String,
        driver_id: String,
        distance: f64,
    },
    #[serde(rename_all = "camelCase")]
    DriverHeartbeat { driver_id: String },
}

/// Outbound frames. `driverLocationsUpdate` and `newRideRequest` are
/// broadcast; the rest are targeted or unicast replies.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    DriverLocationsUpdate {
        drivers: Vec<DriverSnapshot>,
    },
    NearbyDriversResponse {
        drivers: Vec<DriverSnapshot>,
    },
    NewRideRequest(NewRideRequest),
    #[serde(rename_all = "camelCase")]
    RideAccepted {
        ride_id: String,
        driver_id: String,
        driver_name: String,
    },
    #[serde(rename = "rideOTP", rename_all = "camelCase")]
    RideOtp { ride_id: String, otp: String },
    #[serde(rename_all = "camelCase")]
    RideCompleted { ride_id: String, distance: f64 },
    #[serde(rename_all = "camelCase")]
    DriverStatusUpdate {
        driver_id: String,
        status: DriverStatus,
    },
    BookingResult(BookingAck),
}

/// The original booking fields echoed to every driver, extended with the
/// allocated ride id and the durable-store reference.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRideRequest {
    #[serde(flatten)]
    pub request: BookRideRequest,
    pub ride_id: String,
    #[serde(rename = "_id")]
    pub durable_id: String,
}

/// Acknowledgment for `bookRide`, sent back to the requesting connection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<String>,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub durable_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    pub message: String,
}

impl BookingAck {
    pub fn ok(
        ride_id: impl Into<String>,
        durable_id: impl Into<String>,
        otp: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            ride_id: Some(ride_id.into()),
            durable_id: Some(durable_id.into()),
            otp: Some(otp.into()),
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ride_id: None,
            durable_id: None,
            otp: None,
            message: message.into(),
        }
    }
}
