use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::hub::{ConnectionId, driver_channel};
use crate::models::driver::DriverStatus;
use crate::models::events::ServerEvent;
use crate::state::AppState;

/// `pending -> accepted`. Binds the driver, re-delivers the booking OTP to
/// both parties, and moves the driver to `OnRide`. Unknown ride ids are
/// silently dropped.
pub fn accept(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    ride_id: Option<String>,
    driver_id: &str,
    driver_name: &str,
) {
    let Some(ride_id) = ride_id else {
        debug!(driver_id, "acceptRide without a ride id, ignoring");
        return;
    };

    let Some(ride) = state
        .rides
        .mark_accepted(&ride_id, driver_id, driver_name, Utc::now())
    else {
        debug!(%ride_id, driver_id, "accept for unknown ride, ignoring");
        return;
    };

    info!(%ride_id, driver_id, driver_name, "ride accepted");

    // The OTP set at booking is authoritative; acceptance re-delivers it
    // rather than minting a second one, so the durable copy always matches
    // what both parties hold.
    if let Some(user_id) = ride.user_id() {
        state.hub.publish(
            user_id,
            &ServerEvent::RideAccepted {
                ride_id: ride_id.clone(),
                driver_id: driver_id.to_string(),
                driver_name: driver_name.to_string(),
            },
        );
        state.hub.publish(
            user_id,
            &ServerEvent::RideOtp {
                ride_id: ride_id.clone(),
                otp: ride.otp.clone(),
            },
        );
    }

    state.hub.publish(
        &driver_channel(driver_id),
        &ServerEvent::RideOtp {
            ride_id: ride_id.clone(),
            otp: ride.otp.clone(),
        },
    );

    update_driver_status(state, connection_id, driver_id, DriverStatus::OnRide);
}

/// `pending -> rejected`. Returns the driver to `Live`. Unknown ride ids
/// are silently dropped.
pub fn reject(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    ride_id: &str,
    driver_id: &str,
) {
    if state.rides.mark_rejected(ride_id, Utc::now()).is_none() {
        debug!(%ride_id, driver_id, "reject for unknown ride, ignoring");
        return;
    }

    info!(%ride_id, driver_id, "ride rejected");
    update_driver_status(state, connection_id, driver_id, DriverStatus::Live);
}

/// `accepted -> completed`. Notifies the requesting user, returns the
/// driver to `Live`, and schedules removal of the in-memory record after
/// the configured delay so late reads still find it.
pub fn complete(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    ride_id: &str,
    driver_id: &str,
    distance: f64,
) {
    let Some(ride) = state.rides.mark_completed(ride_id, distance, Utc::now()) else {
        debug!(%ride_id, driver_id, "complete for unknown ride, ignoring");
        return;
    };

    info!(%ride_id, driver_id, distance, "ride completed");

    if let Some(user_id) = ride.user_id() {
        state.hub.publish(
            user_id,
            &ServerEvent::RideCompleted {
                ride_id: ride_id.to_string(),
                distance,
            },
        );
    }

    update_driver_status(state, connection_id, driver_id, DriverStatus::Live);

    let state = state.clone();
    let ride_id = ride_id.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(state.ride_purge_delay).await;
        if state.rides.remove(&ride_id).is_some() {
            state.metrics.active_rides.set(state.rides.len() as i64);
            debug!(%ride_id, "purged completed ride");
        }
    });
}

fn update_driver_status(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    driver_id: &str,
    status: DriverStatus,
) {
    if state.presence.set_status(driver_id, status) {
        state.hub.send_to(
            connection_id,
            ServerEvent::DriverStatusUpdate {
                driver_id: driver_id.to_string(),
                status,
            },
        );
    }
}
