//! Middleware del sistema
//!
//! Extracción de la identidad del actor, extractores con errores de la API
//! y CORS.

pub mod actor;
pub mod cors;
pub mod extract;

pub use actor::actor_from_headers;
pub use cors::cors_layer;
pub use extract::{ApiJson, ApiPath, ApiQuery, OptionalApiJson};
