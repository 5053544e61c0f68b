use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::controllers::DispatchController;
use crate::dto::ApiResponse;
use crate::middleware::ApiPath;
use crate::models::{Actor, Booking};
use crate::services::DispatchSummary;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_dispatch_router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(pending_queue))
        .route("/summary", get(summary))
        .route("/auto/:booking_id", post(auto_assign))
        .route("/next", post(dispatch_next))
}

async fn pending_queue(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, AppError> {
    let response = DispatchController::new(&state).queue(&actor).await?;
    Ok(Json(response))
}

async fn summary(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<DispatchSummary>, AppError> {
    let response = DispatchController::new(&state).summary(&actor).await?;
    Ok(Json(response))
}

async fn auto_assign(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(booking_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = DispatchController::new(&state)
        .auto_assign(&actor, booking_id)
        .await?;
    Ok(Json(response))
}

async fn dispatch_next(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let response = DispatchController::new(&state).dispatch_next(&actor).await?;
    Ok(Json(response))
}
