use ambulance_dispatch::config::EnvironmentConfig;
use ambulance_dispatch::{build_app, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN: (&str, i64) = ("ADMIN", 1);

fn create_test_app() -> Router {
    let state = AppState::in_memory(EnvironmentConfig::default()).unwrap();
    build_app(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    actor: Option<(&str, i64)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((role, id)) = actor {
        builder = builder
            .header("x-actor-role", role)
            .header("x-actor-id", id.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn register_ambulance(app: &Router, number: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/ambulances",
        Some(ADMIN),
        Some(json!({ "vehicle_number": number, "vehicle_type": "ICU" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

async fn register_driver(app: &Router, user_id: i64) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/drivers",
        Some(ADMIN),
        Some(json!({
            "user_id": user_id,
            "name": format!("Driver {}", user_id),
            "phone": "+91 98765 43210",
            "license_number": format!("dl-{}", user_id)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

async fn create_booking(app: &Router, patient_id: i64, booking_type: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/bookings",
        Some(("PATIENT", patient_id)),
        Some(json!({
            "pickup_location": "12 MG Road",
            "pickup_lat": 12.9716,
            "pickup_lng": 77.5946,
            "destination_location": "City Hospital",
            "destination_lat": 12.9352,
            "destination_lng": 77.6245,
            "booking_type": booking_type
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

async fn assign(app: &Router, booking_id: i64, ambulance_id: i64, driver_id: i64) -> (StatusCode, Value) {
    send(
        app,
        Method::PUT,
        &format!("/api/bookings/{}/assign", booking_id),
        Some(ADMIN),
        Some(json!({ "ambulance_id": ambulance_id, "driver_id": driver_id })),
    )
    .await
}

async fn advance(app: &Router, actor: (&str, i64), booking_id: i64, status: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::PUT,
        &format!("/api/bookings/{}/status", booking_id),
        Some(actor),
        Some(json!({ "status": status })),
    )
    .await
}

async fn get_json(app: &Router, uri: &str, actor: (&str, i64)) -> Value {
    let (status, body) = send(app, Method::GET, uri, Some(actor), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ambulance_dispatch");
}

#[tokio::test]
async fn test_happy_path_releases_resources_and_charges() {
    let app = create_test_app();
    let ambulance_id = register_ambulance(&app, "KA-01-AB-1234").await;
    let driver_id = register_driver(&app, 500).await;
    let booking_id = create_booking(&app, 42, "EMERGENCY").await;

    let (status, body) = assign(&app, booking_id, ambulance_id, driver_id).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "ACCEPTED");

    let ambulance = get_json(&app, &format!("/api/ambulances/{}", ambulance_id), ADMIN).await;
    assert_eq!(ambulance["status"], "BOOKED");

    let driver = ("DRIVER", 500);
    let (status, body) = advance(&app, driver, booking_id, "ON_THE_WAY").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let driver_view = get_json(&app, &format!("/api/drivers/{}", driver_id), driver).await;
    assert_eq!(driver_view["status"], "ON_TRIP");

    let (status, body) = advance(&app, driver, booking_id, "COMPLETED").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "COMPLETED");
    assert!(body["data"]["total_charge"].is_string() || body["data"]["total_charge"].is_number());

    let ambulance = get_json(&app, &format!("/api/ambulances/{}", ambulance_id), ADMIN).await;
    assert_eq!(ambulance["status"], "AVAILABLE");
    let driver_view = get_json(&app, &format!("/api/drivers/{}", driver_id), ADMIN).await;
    assert_eq!(driver_view["status"], "AVAILABLE");

    let completed = get_json(&app, "/api/trips/completed", ADMIN).await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_assignment_has_exactly_one_winner() {
    let app = create_test_app();
    let ambulance_id = register_ambulance(&app, "KA-01-AB-0001").await;
    let driver_id = register_driver(&app, 501).await;
    let first = create_booking(&app, 1, "NORMAL").await;
    let second = create_booking(&app, 2, "NORMAL").await;

    let (a, b) = tokio::join!(
        assign(&app, first, ambulance_id, driver_id),
        assign(&app, second, ambulance_id, driver_id),
    );

    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let active = get_json(&app, "/api/trips/active", ADMIN).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_illegal_transition_is_conflict() {
    let app = create_test_app();
    let booking_id = create_booking(&app, 7, "NORMAL").await;

    let (status, body) = advance(&app, ADMIN, booking_id, "COMPLETED").await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    assert_eq!(body["code"], "CONFLICT");

    let booking = get_json(&app, &format!("/api/bookings/{}", booking_id), ADMIN).await;
    assert_eq!(booking["status"], "REQUESTED");
}

#[tokio::test]
async fn test_second_start_is_conflict() {
    let app = create_test_app();
    let ambulance_id = register_ambulance(&app, "KA-02-CD-2222").await;
    let driver_id = register_driver(&app, 502).await;
    let booking_id = create_booking(&app, 8, "NORMAL").await;
    assign(&app, booking_id, ambulance_id, driver_id).await;

    let (first, _) = advance(&app, ADMIN, booking_id, "ON_THE_WAY").await;
    let (second, _) = advance(&app, ADMIN, booking_id, "ON_THE_WAY").await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_releases_resources() {
    let app = create_test_app();
    let ambulance_id = register_ambulance(&app, "KA-03-EF-3333").await;
    let driver_id = register_driver(&app, 503).await;
    let booking_id = create_booking(&app, 9, "NORMAL").await;
    assign(&app, booking_id, ambulance_id, driver_id).await;

    // Sin cuerpo: cancelación sin motivo
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{}/cancel", booking_id),
        Some(("PATIENT", 9)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "CANCELLED");

    let ambulances = get_json(&app, "/api/fleet/ambulances", ADMIN).await;
    assert_eq!(ambulances[0]["id"], ambulance_id);
    let drivers = get_json(&app, "/api/fleet/drivers", ADMIN).await;
    assert_eq!(drivers[0]["id"], driver_id);

    // Una reserva terminal no se vuelve a cancelar
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{}/cancel", booking_id),
        Some(ADMIN),
        Some(json!({ "reason": "duplicate" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_while_on_the_way_is_rejected() {
    let app = create_test_app();
    let ambulance_id = register_ambulance(&app, "KA-04-GH-4444").await;
    let driver_id = register_driver(&app, 504).await;
    let booking_id = create_booking(&app, 10, "EMERGENCY").await;
    assign(&app, booking_id, ambulance_id, driver_id).await;
    advance(&app, ("DRIVER", 504), booking_id, "ON_THE_WAY").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{}/cancel", booking_id),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_created_booking_is_listed_for_patient() {
    let app = create_test_app();
    let booking_id = create_booking(&app, 77, "NORMAL").await;
    create_booking(&app, 78, "NORMAL").await;

    let bookings = get_json(&app, "/api/trips/patient/77", ("PATIENT", 77)).await;
    let bookings = bookings.as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["id"], booking_id);
    assert_eq!(bookings[0]["pickup_location"], "12 MG Road");
    assert_eq!(bookings[0]["booking_type"], "NORMAL");

    let (status, _) = send(&app, Method::GET, "/api/trips/patient/77", Some(("PATIENT", 78)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_actor_headers_are_unauthorized() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::GET, "/api/dispatch/queue", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, Method::GET, "/api/dispatch/queue", Some(("NURSE", 3)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/ambulances",
        Some(("DOCTOR", 3)),
        Some(json!({ "vehicle_number": "KA-05-IJ-5555", "vehicle_type": "MORTUARY" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_invalid_booking_is_validation_error() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(("DOCTOR", 3)),
        Some(json!({
            "pickup_location": "Ward 3",
            "destination_location": "City Hospital",
            "booking_type": "NORMAL"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stale_location_ping_is_rejected() {
    let app = create_test_app();
    let driver_id = register_driver(&app, 505).await;
    let uri = format!("/api/drivers/{}/location", driver_id);
    let driver = Some(("DRIVER", 505));

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        driver,
        Some(json!({ "latitude": 12.97, "longitude": 77.59, "sequence": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        driver,
        Some(json!({ "latitude": 12.98, "longitude": 77.60, "sequence": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Otro conductor no puede reportar por él
    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(("DRIVER", 999)),
        Some(json!({ "latitude": 12.98, "longitude": 77.60 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tracking_shows_driver_location_during_trip() {
    let app = create_test_app();
    let ambulance_id = register_ambulance(&app, "KA-06-KL-6666").await;
    let driver_id = register_driver(&app, 506).await;
    let booking_id = create_booking(&app, 11, "EMERGENCY").await;
    assign(&app, booking_id, ambulance_id, driver_id).await;

    send(
        &app,
        Method::PUT,
        &format!("/api/drivers/{}/location", driver_id),
        Some(("DRIVER", 506)),
        Some(json!({ "latitude": 12.95, "longitude": 77.61, "booking_id": booking_id })),
    )
    .await;

    let tracking = get_json(
        &app,
        &format!("/api/bookings/{}/tracking", booking_id),
        ("PATIENT", 11),
    )
    .await;
    assert_eq!(tracking["status"], "ACCEPTED");
    assert_eq!(tracking["driver_id"], driver_id);
    assert_eq!(tracking["driver_location"]["latitude"], 12.95);
    assert_eq!(tracking["poll_interval_secs"], 5);
}

#[tokio::test]
async fn test_dispatch_queue_puts_emergencies_first() {
    let app = create_test_app();
    let normal = create_booking(&app, 20, "NORMAL").await;
    let emergency = create_booking(&app, 21, "EMERGENCY").await;
    let later_normal = create_booking(&app, 22, "NORMAL").await;

    let queue = get_json(&app, "/api/dispatch/queue", ADMIN).await;
    let ids: Vec<i64> = queue
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![emergency, normal, later_normal]);

    let summary = get_json(&app, "/api/dispatch/summary", ADMIN).await;
    assert_eq!(summary["pending_emergencies"], 1);
}

#[tokio::test]
async fn test_dispatch_next_assigns_the_top_of_the_queue() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::POST, "/api/dispatch/next", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    register_ambulance(&app, "KA-07-MN-7777").await;
    register_driver(&app, 507).await;
    create_booking(&app, 30, "NORMAL").await;
    let emergency = create_booking(&app, 31, "EMERGENCY").await;

    let (status, body) = send(&app, Method::POST, "/api/dispatch/next", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["id"], emergency);
    assert_eq!(body["data"]["status"], "ACCEPTED");

    // Sin recursos libres la siguiente asignación automática choca
    let (status, _) = send(&app, Method::POST, "/api/dispatch/next", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_metrics_endpoint_exports_counters() {
    let app = create_test_app();
    create_booking(&app, 40, "NORMAL").await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("ambulance_dispatch_booking_events_total{event=\"created\"} 1"));
}

#[tokio::test]
async fn test_events_for_finished_booking_send_only_the_snapshot() {
    let app = create_test_app();
    let booking_id = create_booking(&app, 50, "NORMAL").await;
    send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{}/cancel", booking_id),
        Some(("PATIENT", 50)),
        None,
    )
    .await;

    let request = Request::builder()
        .uri(format!("/api/bookings/{}/events", booking_id))
        .header("x-actor-role", "PATIENT")
        .header("x-actor-id", "50")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("event: snapshot"));
    assert!(text.contains("\"status\":\"CANCELLED\""));
}

#[tokio::test]
async fn test_unknown_enum_values_are_validation_errors() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/ambulances",
        Some(ADMIN),
        Some(json!({ "vehicle_number": "KA-08-OP-8888", "vehicle_type": "BUS" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, Method::GET, "/api/bookings?status=FLYING", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, Method::GET, "/api/bookings/abc", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_cancel_with_malformed_body_is_rejected() {
    let app = create_test_app();
    let booking_id = create_booking(&app, 60, "NORMAL").await;
    let uri = format!("/api/bookings/{}/cancel", booking_id);

    let request = Request::builder()
        .method(Method::PUT)
        .uri(&uri)
        .header("x-actor-role", "PATIENT")
        .header("x-actor-id", "60")
        .header("content-type", "application/json")
        .body(Body::from("{\"reason\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let booking = get_json(&app, &format!("/api/bookings/{}", booking_id), ADMIN).await;
    assert_eq!(booking["status"], "REQUESTED");

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(("PATIENT", 60)),
        Some(json!({ "reason": "feeling better" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["cancel_reason"], "feeling better");
}

#[tokio::test]
async fn test_future_ping_does_not_block_later_reports() {
    let app = create_test_app();
    let driver_id = register_driver(&app, 508).await;
    let uri = format!("/api/drivers/{}/location", driver_id);
    let driver = Some(("DRIVER", 508));

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        driver,
        Some(json!({
            "latitude": 12.97,
            "longitude": 77.59,
            "sequence": 1,
            "recorded_at": "2100-01-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        driver,
        Some(json!({ "latitude": 12.97, "longitude": 77.59, "sequence": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_overlong_phone_is_rejected_before_storage() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/drivers",
        Some(ADMIN),
        Some(json!({
            "user_id": 509,
            "name": "Long Phone",
            "phone": format!("+91 98765 43210{}", " ".repeat(40)),
            "license_number": "dl-509"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
