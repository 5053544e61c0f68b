//! Middleware de CORS
//!
//! Este módulo maneja la configuración de CORS para permitir
//! requests desde diferentes orígenes.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::config::EnvironmentConfig;
use crate::middleware::actor::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};

/// CORS según la configuración: sin orígenes en desarrollo se permite todo
pub fn cors_layer(config: &EnvironmentConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        if config.is_development() {
            return CorsLayer::very_permissive();
        }
        warn!("⚠️ CORS_ORIGINS vacío fuera de desarrollo: no se permite ningún origen");
    }
    cors_with_origins(&config.cors_origins)
}

/// Crear middleware de CORS con orígenes específicos
pub fn cors_with_origins(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("⚠️ Origen CORS inválido ignorado: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
            HeaderName::from_static(ACTOR_ROLE_HEADER),
            HeaderName::from_static(ACTOR_ID_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}
