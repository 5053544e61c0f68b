use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};

use crate::controllers::FleetController;
use crate::dto::fleet_dto::{
    AmbulanceListQuery, DriverListQuery, LocationUpdateRequest, RegisterAmbulanceRequest,
    RegisterDriverRequest, UpdateAmbulanceStatusRequest, UpdateDriverStatusRequest,
};
use crate::dto::ApiResponse;
use crate::middleware::{ApiJson, ApiPath, ApiQuery};
use crate::models::{Actor, Ambulance, Driver};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_ambulance_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ambulances).post(register_ambulance))
        .route("/:id", get(get_ambulance))
        .route("/:id/status", put(set_ambulance_status))
}

pub fn create_driver_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_drivers).post(register_driver))
        .route("/:id", get(get_driver))
        .route("/:id/status", put(set_driver_status))
        .route("/:id/location", put(report_location))
}

/// Recursos disponibles para la asignación manual
pub fn create_fleet_router() -> Router<AppState> {
    Router::new()
        .route("/ambulances", get(available_ambulances))
        .route("/drivers", get(available_drivers))
}

async fn register_ambulance(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<RegisterAmbulanceRequest>,
) -> Result<Json<ApiResponse<Ambulance>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.register_ambulance(&actor, request).await?;
    Ok(Json(response))
}

async fn list_ambulances(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<AmbulanceListQuery>,
) -> Result<Json<Vec<Ambulance>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.list_ambulances(&actor, query.status).await?;
    Ok(Json(response))
}

async fn get_ambulance(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Ambulance>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.get_ambulance(&actor, id).await?;
    Ok(Json(response))
}

async fn set_ambulance_status(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateAmbulanceStatusRequest>,
) -> Result<Json<ApiResponse<Ambulance>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller
        .set_ambulance_status(&actor, id, request.status)
        .await?;
    Ok(Json(response))
}

async fn available_ambulances(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Ambulance>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.available_ambulances(&actor).await?;
    Ok(Json(response))
}

async fn register_driver(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<RegisterDriverRequest>,
) -> Result<Json<ApiResponse<Driver>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.register_driver(&actor, request).await?;
    Ok(Json(response))
}

async fn list_drivers(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<DriverListQuery>,
) -> Result<Json<Vec<Driver>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.list_drivers(&actor, query.status).await?;
    Ok(Json(response))
}

async fn get_driver(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Driver>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.get_driver(&actor, id).await?;
    Ok(Json(response))
}

async fn set_driver_status(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateDriverStatusRequest>,
) -> Result<Json<ApiResponse<Driver>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller
        .set_driver_status(&actor, id, request.status)
        .await?;
    Ok(Json(response))
}

async fn report_location(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<LocationUpdateRequest>,
) -> Result<Json<ApiResponse<Driver>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.report_location(&actor, id, request).await?;
    Ok(Json(response))
}

async fn available_drivers(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Driver>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.available_drivers(&actor).await?;
    Ok(Json(response))
}
