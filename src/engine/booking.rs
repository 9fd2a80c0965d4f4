use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use crate::hub::ConnectionId;
use crate::models::events::{BookingAck, NewRideRequest, ServerEvent};
use crate::models::ride::{BookRideRequest, RideRecord, RideStatus, StoredRide};
use crate::state::AppState;
use crate::storage::StorageError;

/// Run one booking attempt end to end: allocate the ride id, derive the
/// OTP, hold the in-flight marker across the durable writes, and return the
/// acknowledgment for the requesting connection. The marker is cleared on
/// every outcome.
pub async fn book(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    request: BookRideRequest,
) -> BookingAck {
    let ride_id = state.ids.allocate().await;
    let otp = derive_otp(request.customer_id.as_deref());

    // Synchronous check-and-mark, the only atomic section of the booking
    // path. Everything after it may interleave with other handlers.
    if !state.rides.begin_inflight(&ride_id) {
        info!(%ride_id, "booking already in flight, rejecting duplicate");
        state
            .metrics
            .bookings_total
            .with_label_values(&["duplicate"])
            .inc();
        return BookingAck::fail("Ride is already being processed");
    }

    let ack = process(state, connection_id, &ride_id, otp, request).await;
    state.rides.end_inflight(&ride_id);
    ack
}

async fn process(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    ride_id: &str,
    otp: String,
    request: BookRideRequest,
) -> BookingAck {
    let (Some(user_id), Some(customer_id), Some(user_name), Some(pickup), Some(drop)) = (
        required(&request.user_id),
        required(&request.customer_id),
        required(&request.user_name),
        request.pickup.clone(),
        request.drop.clone(),
    ) else {
        warn!(%ride_id, "booking rejected: missing required fields");
        state
            .metrics
            .bookings_total
            .with_label_values(&["invalid"])
            .inc();
        return BookingAck::fail("Missing required fields");
    };

    // Best-effort replay check: a ride already durable under this id means
    // an earlier attempt succeeded, so answer with its result.
    match state.storage.find_ride_by_external_id(ride_id).await {
        Ok(Some(existing)) => {
            info!(%ride_id, "ride already durable, replaying earlier result");
            // A replayed booking is still a successful one: the retrying
            // rider needs the user-id binding for targeted notifications.
            state.hub.join(&user_id, connection_id);
            state
                .metrics
                .bookings_total
                .with_label_values(&["success"])
                .inc();
            return BookingAck::ok(
                ride_id,
                existing.durable_id,
                existing.otp,
                "Ride already exists",
            );
        }
        Ok(None) => {}
        Err(err) => {
            error!(%ride_id, error = %err, "durable lookup failed");
            state
                .metrics
                .bookings_total
                .with_label_values(&["error"])
                .inc();
            return BookingAck::fail("Failed to process ride booking");
        }
    }

    let stored = StoredRide {
        durable_id: String::new(),
        ride_id: ride_id.to_string(),
        user_id: user_id.clone(),
        customer_id,
        user_name,
        pickup_address: pickup.address_or_default(),
        drop_address: drop.address_or_default(),
        pickup_lat: pickup.lat,
        pickup_lng: pickup.lng,
        drop_lat: drop.lat,
        drop_lng: drop.lng,
        fare: request.estimated_price.unwrap_or(0.0),
        ride_type: request
            .vehicle_type
            .clone()
            .unwrap_or_else(|| "taxi".to_string()),
        otp: otp.clone(),
        distance: request.distance.clone().unwrap_or_else(|| "0 km".to_string()),
        travel_time: request
            .travel_time
            .clone()
            .unwrap_or_else(|| "0 mins".to_string()),
        is_return_trip: request.want_return.unwrap_or(false),
        status: RideStatus::Pending,
        created_at: Utc::now(),
    };

    match state.storage.create_ride(stored).await {
        Ok(durable_id) => {
            state.rides.insert(RideRecord {
                ride_id: ride_id.to_string(),
                durable_id: durable_id.clone(),
                otp: otp.clone(),
                status: RideStatus::Pending,
                request: request.clone(),
                driver_id: None,
                driver_name: None,
                final_distance: None,
                created_at: Utc::now(),
                accepted_at: None,
                rejected_at: None,
                completed_at: None,
            });
            state.metrics.active_rides.set(state.rides.len() as i64);

            // Bind the rider's connection to their user id so acceptance and
            // completion notices can be targeted later.
            state.hub.join(&user_id, connection_id);

            state.metrics.broadcasts_total.inc();
            let delivered = state.hub.broadcast(&ServerEvent::NewRideRequest(NewRideRequest {
                request,
                ride_id: ride_id.to_string(),
                durable_id: durable_id.clone(),
            }));

            info!(%ride_id, %durable_id, delivered, "ride booked and broadcast");
            state
                .metrics
                .bookings_total
                .with_label_values(&["success"])
                .inc();
            BookingAck::ok(ride_id, durable_id, otp, "Ride booked successfully!")
        }
        Err(StorageError::Validation(messages)) => {
            warn!(%ride_id, ?messages, "durable validation rejected the ride");
            state
                .metrics
                .bookings_total
                .with_label_values(&["invalid"])
                .inc();
            BookingAck::fail(format!("Validation failed: {}", messages.join(", ")))
        }
        Err(StorageError::DuplicateKey(_)) => {
            warn!(%ride_id, "duplicate ride id in durable store, recovering");
            match state.storage.find_ride_by_external_id(ride_id).await {
                Ok(Some(existing)) => {
                    state.hub.join(&user_id, connection_id);
                    state
                        .metrics
                        .bookings_total
                        .with_label_values(&["success"])
                        .inc();
                    BookingAck::ok(
                        ride_id,
                        existing.durable_id,
                        existing.otp,
                        "Ride already exists (duplicate handled)",
                    )
                }
                _ => {
                    state
                        .metrics
                        .bookings_total
                        .with_label_values(&["error"])
                        .inc();
                    BookingAck::fail("Failed to process ride booking (duplicate error)")
                }
            }
        }
        Err(err) => {
            error!(%ride_id, error = %err, "failed to persist ride");
            state
                .metrics
                .bookings_total
                .with_label_values(&["error"])
                .inc();
            BookingAck::fail("Failed to process ride booking")
        }
    }
}

fn required(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Last four characters of the customer id when it is long enough,
/// otherwise a random four-digit code.
fn derive_otp(customer_id: Option<&str>) -> String {
    match customer_id {
        Some(id) if id.chars().count() >= 4 => {
            let chars: Vec<char> = id.chars().collect();
            chars[chars.len() - 4..].iter().collect()
        }
        _ => rand::thread_rng().gen_range(1000..10000).to_string(),
    }
}
