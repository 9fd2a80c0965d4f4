use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{booking, lifecycle};
use crate::hub::{ALL_DRIVERS, ConnectionId, driver_channel};
use crate::models::driver::{DriverRecord, GeoPoint};
use crate::models::events::{ClientEvent, ServerEvent};
use crate::models::ride::LocationSample;
use crate::state::AppState;

/// Per-connection state. A session starts anonymous and becomes
/// driver-bound on the first `registerDriver`; rider connections stay
/// anonymous and need no disconnect cleanup.
struct Session {
    connection_id: ConnectionId,
    driver_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    let (outbox, mut outbox_rx) = mpsc::channel(state.client_buffer_size);
    state.hub.register(connection_id, outbox);
    info!(%connection_id, clients = state.hub.connection_count(), "client connected");

    let send_task = tokio::spawn(async move {
        while let Some(event) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound event");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        connection_id,
        driver_id: None,
    };

    while let Some(Ok(message)) = ws_receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };

        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => dispatch(&state, &mut session, event).await,
            Err(err) => {
                // One bad frame must never take down the connection or
                // affect anyone else's.
                warn!(%connection_id, error = %err, "ignoring malformed event");
            }
        }
    }

    state.hub.unregister(connection_id);
    if let Some(driver_id) = session.driver_id.take() {
        driver_disconnected(&state, &driver_id).await;
    }
    send_task.abort();

    info!(%connection_id, clients = state.hub.connection_count(), "client disconnected");
}

async fn dispatch(state: &Arc<AppState>, session: &mut Session, event: ClientEvent) {
    match event {
        ClientEvent::RegisterDriver {
            driver_id,
            driver_name,
            latitude,
            longitude,
            vehicle_type,
        } => {
            register_driver(
                state,
                session,
                driver_id,
                driver_name,
                latitude,
                longitude,
                vehicle_type,
            )
            .await;
        }
        ClientEvent::DriverLiveLocationUpdate {
            driver_id,
            driver_name,
            lat,
            lng,
        } => {
            if let Some(record) = state.presence.update_location(&driver_id, lat, lng) {
                debug!(%driver_id, %driver_name, lat, lng, "driver location update");
                save_location(state, &record).await;
                state.broadcast_presence();
            }
        }
        ClientEvent::RequestNearbyDrivers {
            latitude,
            longitude,
            radius,
        } => {
            // The radius is accepted but not applied: every online driver
            // is returned.
            let drivers = state.presence.list_online();
            debug!(
                latitude,
                longitude,
                ?radius,
                count = drivers.len(),
                "nearby drivers requested"
            );
            state.hub.send_to(
                session.connection_id,
                ServerEvent::NearbyDriversResponse { drivers },
            );
        }
        ClientEvent::BookRide(request) => {
            let ack = booking::book(state, session.connection_id, request).await;
            state
                .hub
                .send_to(session.connection_id, ServerEvent::BookingResult(ack));
        }
        ClientEvent::AcceptRide {
            ride_id,
            driver_id,
            driver_name,
        } => {
            lifecycle::accept(
                state,
                session.connection_id,
                ride_id,
                &driver_id,
                &driver_name,
            );
        }
        ClientEvent::RejectRide { ride_id, driver_id } => {
            lifecycle::reject(state, session.connection_id, &ride_id, &driver_id);
        }
        ClientEvent::CompleteRide {
            ride_id,
            driver_id,
            distance,
        } => {
            lifecycle::complete(state, session.connection_id, &ride_id, &driver_id, distance);
        }
        ClientEvent::DriverHeartbeat { driver_id } => {
            if state.presence.heartbeat(&driver_id) {
                debug!(%driver_id, "driver heartbeat");
            }
        }
    }
}

async fn register_driver(
    state: &Arc<AppState>,
    session: &mut Session,
    driver_id: String,
    driver_name: String,
    latitude: f64,
    longitude: f64,
    vehicle_type: Option<String>,
) {
    session.driver_id = Some(driver_id.clone());

    state.hub.join(ALL_DRIVERS, session.connection_id);
    state
        .hub
        .join(&driver_channel(&driver_id), session.connection_id);

    let record = state.presence.register(
        &driver_id,
        &driver_name,
        GeoPoint {
            lat: latitude,
            lng: longitude,
        },
        vehicle_type.unwrap_or_else(|| "taxi".to_string()),
        session.connection_id,
    );

    info!(
        %driver_id,
        %driver_name,
        latitude,
        longitude,
        vehicle_type = %record.vehicle_type,
        "driver registered"
    );

    save_location(state, &record).await;
    state.broadcast_presence();
}

async fn driver_disconnected(state: &Arc<AppState>, driver_id: &str) {
    if let Some(record) = state.presence.mark_offline(driver_id) {
        info!(driver_id, "driver went offline");
        save_location(state, &record).await;
    }
    state.broadcast_presence();
}

/// Durable location write. Failures are logged and isolated; presence and
/// broadcasting continue regardless.
async fn save_location(state: &Arc<AppState>, record: &DriverRecord) {
    let sample = LocationSample {
        driver_id: record.driver_id.clone(),
        driver_name: record.driver_name.clone(),
        lat: record.location.lat,
        lng: record.location.lng,
        vehicle_type: record.vehicle_type.clone(),
        status: record.status,
        timestamp: Utc::now(),
    };

    if let Err(err) = state.storage.save_location(sample).await {
        error!(driver_id = %record.driver_id, error = %err, "failed to save driver location");
    }
}
