use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, put},
    Json, Router,
};
use futures::{stream, Stream, StreamExt};

use crate::controllers::BookingController;
use crate::dto::booking_dto::{
    AssignBookingRequest, BookingListQuery, CancelBookingRequest, CreateBookingRequest,
    UpdateBookingStatusRequest,
};
use crate::dto::ApiResponse;
use crate::middleware::{ApiJson, ApiPath, ApiQuery, OptionalApiJson};
use crate::models::{Actor, Booking, DispatchEvent};
use crate::services::TrackingSnapshot;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_booking_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route("/:id", get(get_booking))
        .route("/:id/assign", put(assign_booking))
        .route("/:id/status", put(update_booking_status))
        .route("/:id/cancel", put(cancel_booking))
        .route("/:id/tracking", get(booking_tracking))
        .route("/:id/events", get(booking_events))
}

pub fn create_trip_router() -> Router<AppState> {
    Router::new()
        .route("/active", get(active_trips))
        .route("/completed", get(completed_trips))
        .route("/mine", get(my_trips))
        .route("/patient/:patient_id", get(patient_trips))
}

async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<CreateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.create(&actor, request).await?;
    Ok(Json(response))
}

async fn list_bookings(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.list(&actor, query.status).await?;
    Ok(Json(response))
}

async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Booking>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.get(&actor, id).await?;
    Ok(Json(response))
}

async fn assign_booking(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<AssignBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.assign(&actor, id, request).await?;
    Ok(Json(response))
}

async fn update_booking_status(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateBookingStatusRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.update_status(&actor, id, request).await?;
    Ok(Json(response))
}

/// El cuerpo es opcional: `PUT /api/bookings/:id/cancel` sin body cancela sin motivo
async fn cancel_booking(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    OptionalApiJson(request): OptionalApiJson<CancelBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let request = request.unwrap_or_default();
    let controller = BookingController::new(&state);
    let response = controller.cancel(&actor, id, request).await?;
    Ok(Json(response))
}

async fn booking_tracking(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<TrackingSnapshot>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.tracking(&actor, id).await?;
    Ok(Json(response))
}

fn sse_event(name: &str, payload: &impl serde::Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// Stream SSE de una reserva: primero un `snapshot`, luego los eventos en
/// vivo hasta que la reserva termina
async fn booking_events(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Suscribirse antes de leer para no perder eventos intermedios
    let live = state.events.booking_stream(id);
    let booking = BookingController::new(&state).get(&actor, id).await?;
    let live = (!booking.status.is_terminal()).then_some(live);

    let snapshot = sse_event("snapshot", &booking);
    let events = stream::once(async move { snapshot })
        .chain(
            stream::iter(live)
                .flatten()
                .map(|event: DispatchEvent| sse_event(event.kind.label(), &event)),
        )
        .map(Ok);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn active_trips(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.active_trips(&actor).await?;
    Ok(Json(response))
}

async fn completed_trips(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.completed_trips(&actor).await?;
    Ok(Json(response))
}

async fn patient_trips(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(patient_id): ApiPath<i64>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.patient_trips(&actor, patient_id).await?;
    Ok(Json(response))
}

async fn my_trips(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.my_trips(&actor, query.status).await?;
    Ok(Json(response))
}
