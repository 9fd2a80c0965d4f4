use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use ride_dispatch::api::router;
use ride_dispatch::config::Config;
use ride_dispatch::engine::{booking, lifecycle};
use ride_dispatch::hub::{ConnectionId, driver_channel};
use ride_dispatch::models::driver::{DriverStatus, GeoPoint};
use ride_dispatch::models::events::ServerEvent;
use ride_dispatch::models::ride::{BookRideRequest, RideRecord, RideStatus, RideStop, StoredRide};
use ride_dispatch::state::AppState;
use ride_dispatch::storage::Storage;
use ride_dispatch::storage::memory::MemoryStorage;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        http_port: 0,
        log_level: "info".to_string(),
        client_buffer_size: 64,
        stale_after_secs: 300,
        sweep_interval_secs: 60,
        ride_purge_delay_secs: 5,
    }
}

fn setup() -> (Arc<AppState>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let mut state = AppState::new(&test_config(), storage.clone());
    state.ride_purge_delay = Duration::from_millis(50);
    (Arc::new(state), storage)
}

/// Attach a fake connection to the hub, standing in for one socket.
fn connect(state: &AppState) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
    let connection_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(64);
    state.hub.register(connection_id, tx);
    (connection_id, rx)
}

fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(serde_json::to_value(&event).unwrap());
    }
    events
}

fn count(events: &[Value], name: &str) -> usize {
    events.iter().filter(|e| e["event"] == name).count()
}

fn find<'a>(events: &'a [Value], name: &str) -> Option<&'a Value> {
    events.iter().find(|e| e["event"] == name)
}

fn booking_request() -> BookRideRequest {
    BookRideRequest {
        user_id: Some("u1".to_string()),
        customer_id: Some("c1234".to_string()),
        user_name: Some("Alice".to_string()),
        user_mobile: Some("5550001".to_string()),
        pickup: Some(RideStop {
            lat: 1.0,
            lng: 2.0,
            address: Some("A".to_string()),
        }),
        drop: Some(RideStop {
            lat: 3.0,
            lng: 4.0,
            address: Some("B".to_string()),
        }),
        vehicle_type: Some("taxi".to_string()),
        estimated_price: Some(180.0),
        distance: Some("4 km".to_string()),
        travel_time: Some("12 mins".to_string()),
        want_return: Some(false),
    }
}

fn stored_ride(ride_id: &str) -> StoredRide {
    StoredRide {
        durable_id: String::new(),
        ride_id: ride_id.to_string(),
        user_id: "u1".to_string(),
        customer_id: "c1234".to_string(),
        user_name: "Alice".to_string(),
        pickup_address: "A".to_string(),
        drop_address: "B".to_string(),
        pickup_lat: 1.0,
        pickup_lng: 2.0,
        drop_lat: 3.0,
        drop_lng: 4.0,
        fare: 180.0,
        ride_type: "taxi".to_string(),
        otp: "1234".to_string(),
        distance: "4 km".to_string(),
        travel_time: "12 mins".to_string(),
        is_return_trip: false,
        status: RideStatus::Pending,
        created_at: Utc::now(),
    }
}

fn pending_ride(ride_id: &str) -> RideRecord {
    RideRecord {
        ride_id: ride_id.to_string(),
        durable_id: "durable".to_string(),
        otp: "1234".to_string(),
        status: RideStatus::Pending,
        request: booking_request(),
        driver_id: None,
        driver_name: None,
        final_distance: None,
        created_at: Utc::now(),
        accepted_at: None,
        rejected_at: None,
        completed_at: None,
    }
}

fn register_driver(state: &Arc<AppState>, driver_id: &str) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
    let (connection_id, rx) = connect(state);
    state.hub.join(&driver_channel(driver_id), connection_id);
    state.presence.register(
        driver_id,
        "Dana",
        GeoPoint { lat: 1.0, lng: 2.0 },
        "taxi".to_string(),
        connection_id,
    );
    (connection_id, rx)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (state, _storage) = setup();
    let app = router(state);
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["rides"], 0);
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (state, _storage) = setup();
    let app = router(state);
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("drivers_online"));
    assert!(body.contains("bookings_total"));
}

#[tokio::test]
async fn booking_succeeds_with_customer_otp_and_single_broadcast() {
    let (state, storage) = setup();
    let (rider, mut rider_rx) = connect(&state);
    let (_driver, mut driver_rx) = connect(&state);

    let ack = booking::book(&state, rider, booking_request()).await;

    assert!(ack.success);
    assert_eq!(ack.ride_id.as_deref(), Some("RID100001"));
    assert_eq!(ack.otp.as_deref(), Some("1234"));
    assert!(ack.durable_id.is_some());
    assert_eq!(storage.ride_count(), 1);
    assert_eq!(state.rides.len(), 1);

    let driver_events = drain(&mut driver_rx);
    assert_eq!(count(&driver_events, "newRideRequest"), 1);
    let request = find(&driver_events, "newRideRequest").unwrap();
    assert_eq!(request["data"]["rideId"], "RID100001");
    assert_eq!(request["data"]["userId"], "u1");

    // The broadcast is a fan-out to every connection, the rider included.
    let rider_events = drain(&mut rider_rx);
    assert_eq!(count(&rider_events, "newRideRequest"), 1);
}

#[tokio::test]
async fn booking_with_missing_fields_fails_and_clears_guard() {
    let (state, storage) = setup();
    let (rider, _rider_rx) = connect(&state);

    let mut request = booking_request();
    request.user_name = None;

    let ack = booking::book(&state, rider, request).await;

    assert!(!ack.success);
    assert_eq!(ack.message, "Missing required fields");
    assert_eq!(storage.ride_count(), 0);
    assert!(state.rides.is_empty());

    // The in-flight marker for the allocated id must be gone.
    assert!(state.rides.begin_inflight("RID100001"));
}

#[tokio::test]
async fn retried_booking_replays_the_existing_ride() {
    let (state, storage) = setup();
    let (rider, _rider_rx) = connect(&state);
    let (_observer, mut observer_rx) = connect(&state);

    // An earlier attempt already persisted the ride the next allocation
    // will name.
    storage.create_ride(stored_ride("RID100001")).await.unwrap();

    let ack = booking::book(&state, rider, booking_request()).await;

    assert!(ack.success);
    assert_eq!(ack.ride_id.as_deref(), Some("RID100001"));
    assert_eq!(ack.otp.as_deref(), Some("1234"));
    assert_eq!(ack.message, "Ride already exists");
    assert_eq!(storage.ride_count(), 1);

    // A replay answers the caller without re-broadcasting the request.
    assert_eq!(count(&drain(&mut observer_rx), "newRideRequest"), 0);
}

#[tokio::test]
async fn rider_whose_retry_replays_still_receives_targeted_notices() {
    let (state, storage) = setup();
    let (rider, mut rider_rx) = connect(&state);
    let (driver_conn, _driver_rx) = register_driver(&state, "d1");

    // An earlier attempt persisted and mirrored the ride, but this rider's
    // connection holds no user-channel binding yet.
    storage.create_ride(stored_ride("RID100001")).await.unwrap();
    state.rides.insert(pending_ride("RID100001"));

    let ack = booking::book(&state, rider, booking_request()).await;
    assert!(ack.success);
    assert_eq!(ack.message, "Ride already exists");
    drain(&mut rider_rx);

    lifecycle::accept(
        &state,
        driver_conn,
        Some("RID100001".to_string()),
        "d1",
        "Dana",
    );

    let rider_events = drain(&mut rider_rx);
    assert!(find(&rider_events, "rideAccepted").is_some());
    assert_eq!(find(&rider_events, "rideOTP").unwrap()["data"]["otp"], "1234");
}

#[tokio::test]
async fn concurrent_duplicate_booking_is_rejected() {
    let (state, storage) = setup();
    let (rider, _rider_rx) = connect(&state);

    assert!(state.rides.begin_inflight("RID100001"));

    let ack = booking::book(&state, rider, booking_request()).await;

    assert!(!ack.success);
    assert_eq!(ack.message, "Ride is already being processed");
    assert_eq!(storage.ride_count(), 0);

    // The first attempt's marker stays held: a rejected duplicate must not
    // clear it out from under the attempt that owns it.
    assert!(!state.rides.begin_inflight("RID100001"));
    state.rides.end_inflight("RID100001");
    assert!(state.rides.begin_inflight("RID100001"));
}

#[tokio::test]
async fn accept_notifies_both_parties_with_the_booking_otp() {
    let (state, _storage) = setup();
    let (rider, mut rider_rx) = connect(&state);
    let (driver_conn, mut driver_rx) = register_driver(&state, "d1");

    let ack = booking::book(&state, rider, booking_request()).await;
    let ride_id = ack.ride_id.clone().unwrap();
    drain(&mut rider_rx);
    drain(&mut driver_rx);

    lifecycle::accept(&state, driver_conn, Some(ride_id.clone()), "d1", "Dana");

    let rider_events = drain(&mut rider_rx);
    let accepted = find(&rider_events, "rideAccepted").unwrap();
    assert_eq!(accepted["data"]["rideId"], ride_id);
    assert_eq!(accepted["data"]["driverId"], "d1");

    let rider_otp = find(&rider_events, "rideOTP").unwrap();
    assert_eq!(rider_otp["data"]["otp"], "1234");

    let driver_events = drain(&mut driver_rx);
    let driver_otp = find(&driver_events, "rideOTP").unwrap();
    assert_eq!(driver_otp["data"]["otp"], "1234");
    let status = find(&driver_events, "driverStatusUpdate").unwrap();
    assert_eq!(status["data"]["status"], "onRide");

    assert_eq!(state.rides.get(&ride_id).unwrap().status, RideStatus::Accepted);
    assert_eq!(
        state.presence.get("d1").unwrap().status,
        DriverStatus::OnRide
    );
}

#[tokio::test]
async fn accept_on_unknown_ride_is_a_noop() {
    let (state, _storage) = setup();
    let (rider, mut rider_rx) = connect(&state);
    let (driver_conn, mut driver_rx) = register_driver(&state, "d1");
    state.hub.join("u1", rider);

    lifecycle::accept(
        &state,
        driver_conn,
        Some("RID424242".to_string()),
        "d1",
        "Dana",
    );
    lifecycle::accept(&state, driver_conn, None, "d1", "Dana");

    assert!(drain(&mut rider_rx).is_empty());
    assert!(drain(&mut driver_rx).is_empty());
    assert!(state.rides.is_empty());
    assert_eq!(state.presence.get("d1").unwrap().status, DriverStatus::Live);
}

#[tokio::test]
async fn reject_returns_driver_to_live() {
    let (state, _storage) = setup();
    let (rider, _rider_rx) = connect(&state);
    let (driver_conn, mut driver_rx) = register_driver(&state, "d1");

    let ack = booking::book(&state, rider, booking_request()).await;
    let ride_id = ack.ride_id.clone().unwrap();

    lifecycle::accept(&state, driver_conn, Some(ride_id.clone()), "d1", "Dana");
    lifecycle::reject(&state, driver_conn, &ride_id, "d1");

    assert_eq!(state.rides.get(&ride_id).unwrap().status, RideStatus::Rejected);
    assert_eq!(state.presence.get("d1").unwrap().status, DriverStatus::Live);

    let driver_events = drain(&mut driver_rx);
    let status = driver_events
        .iter()
        .rev()
        .find(|e| e["event"] == "driverStatusUpdate")
        .unwrap();
    assert_eq!(status["data"]["status"], "Live");
}

#[tokio::test]
async fn complete_notifies_user_and_purges_after_delay() {
    let (state, _storage) = setup();
    let (rider, mut rider_rx) = connect(&state);
    let (driver_conn, _driver_rx) = register_driver(&state, "d1");

    let ack = booking::book(&state, rider, booking_request()).await;
    let ride_id = ack.ride_id.clone().unwrap();

    lifecycle::accept(&state, driver_conn, Some(ride_id.clone()), "d1", "Dana");
    drain(&mut rider_rx);

    lifecycle::complete(&state, driver_conn, &ride_id, "d1", 4.2);

    let rider_events = drain(&mut rider_rx);
    let completed = find(&rider_events, "rideCompleted").unwrap();
    assert_eq!(completed["data"]["rideId"], ride_id);
    assert_eq!(completed["data"]["distance"], 4.2);

    assert_eq!(state.presence.get("d1").unwrap().status, DriverStatus::Live);

    // Still readable right after completion, gone after the purge delay.
    assert_eq!(
        state.rides.get(&ride_id).unwrap().status,
        RideStatus::Completed
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(state.rides.get(&ride_id).is_none());
}
