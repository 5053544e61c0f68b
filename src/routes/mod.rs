//! Rutas HTTP
//!
//! Cada recurso expone su propio router; `build_app` los monta bajo `/api`
//! junto con `/health`, `/metrics` y las capas comunes.

pub mod booking_routes;
pub mod dispatch_routes;
pub mod fleet_routes;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::cors_layer;
use crate::state::AppState;

/// Peticiones simultáneas que acepta el servidor
const MAX_CONCURRENT_REQUESTS: usize = 1024;

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/ambulances", fleet_routes::create_ambulance_router())
        .nest("/drivers", fleet_routes::create_driver_router())
        .nest("/fleet", fleet_routes::create_fleet_router())
        .nest("/bookings", booking_routes::create_booking_router())
        .nest("/trips", booking_routes::create_trip_router())
        .nest("/dispatch", dispatch_routes::create_dispatch_router());

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ambulance_dispatch",
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
